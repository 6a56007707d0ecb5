use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One lead's enrollment in a multi-step nurture sequence.
/// Invariant: 0 <= current_step <= total_steps. At most one campaign
/// per lead is in a non-completed state (enforced at enrollment).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email_campaigns")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub lead_id: i32,
    pub campaign_type: String,
    pub current_step: i32,
    pub total_steps: i32,
    /// active, paused, completed, unsubscribed
    pub status: String,
    /// When null or in the past, the next step is due
    pub next_send_at: Option<String>,
    pub enrolled_at: String,
    pub timezone: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::lead::Entity",
        from = "Column::LeadId",
        to = "super::lead::Column::Id"
    )]
    Lead,
    #[sea_orm(has_many = "super::campaign_history::Entity")]
    CampaignHistory,
}

impl Related<super::lead::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lead.def()
    }
}

impl Related<super::campaign_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CampaignHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignDto {
    pub id: i32,
    pub lead_id: i32,
    pub campaign_type: String,
    pub current_step: i32,
    pub total_steps: i32,
    pub status: String,
    pub next_send_at: Option<String>,
    pub enrolled_at: String,
    pub timezone: String,
}

impl From<Model> for CampaignDto {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            lead_id: model.lead_id,
            campaign_type: model.campaign_type,
            current_step: model.current_step,
            total_steps: model.total_steps,
            status: model.status,
            next_send_at: model.next_send_at,
            enrolled_at: model.enrolled_at,
            timezone: model.timezone,
        }
    }
}
