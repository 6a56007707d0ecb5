use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only log of each step actually attempted, one row per send.
/// Only the open/click tracking endpoints ever touch a row after insert.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub campaign_id: i32,
    pub lead_id: i32,
    pub step_number: i32,
    pub subject: String,
    pub delivered: bool,
    pub error_message: Option<String>,
    pub sent_at: String,
    pub opened_at: Option<String>,
    pub clicked_at: Option<String>,
    pub clicked_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::email_campaign::Entity",
        from = "Column::CampaignId",
        to = "super::email_campaign::Column::Id"
    )]
    EmailCampaign,
}

impl Related<super::email_campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailCampaign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
