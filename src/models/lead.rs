use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "leads")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// form, chat, voice, email, referral
    pub source: String,
    pub project_type: Option<String>,
    pub budget: Option<f64>,
    pub message: Option<String>,
    /// new, contacted, quoted, won, lost
    pub status: String,
    pub affiliate_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::email_campaign::Entity")]
    EmailCampaign,
    #[sea_orm(has_many = "super::appointment::Entity")]
    Appointment,
}

impl Related<super::email_campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailCampaign.def()
    }
}

impl Related<super::appointment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appointment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct LeadDto {
    pub id: Option<i32>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub source: String,
    pub project_type: Option<String>,
    pub budget: Option<f64>,
    pub message: Option<String>,
    pub status: String,
    pub affiliate_code: Option<String>,
    pub created_at: Option<String>,
}

impl From<Model> for LeadDto {
    fn from(model: Model) -> Self {
        Self {
            id: Some(model.id),
            name: model.name,
            email: model.email,
            phone: model.phone,
            source: model.source,
            project_type: model.project_type,
            budget: model.budget,
            message: model.message,
            status: model.status,
            affiliate_code: model.affiliate_code,
            created_at: Some(model.created_at),
        }
    }
}
