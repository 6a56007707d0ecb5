use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per tracked referral visit. Conversion and commission are
/// stamped later, when a lead arrives carrying the affiliate code.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "referrals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub affiliate_id: i32,
    pub lead_id: Option<i32>,
    pub target_url: Option<String>,
    pub converted: bool,
    pub commission_amount: f64,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::affiliate::Entity",
        from = "Column::AffiliateId",
        to = "super::affiliate::Column::Id"
    )]
    Affiliate,
}

impl Related<super::affiliate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Affiliate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
