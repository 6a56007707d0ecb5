use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "appointments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub lead_id: i32,
    pub scheduled_at: String,
    /// site_visit, consultation
    pub kind: String,
    /// scheduled, completed, cancelled
    pub status: String,
    pub notes: Option<String>,
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
}

impl Related<super::lead::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lead.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppointmentDto {
    pub id: Option<i32>,
    pub lead_id: i32,
    pub scheduled_at: String,
    pub kind: String,
    pub status: Option<String>,
    pub notes: Option<String>,
}

impl From<Model> for AppointmentDto {
    fn from(model: Model) -> Self {
        Self {
            id: Some(model.id),
            lead_id: model.lead_id,
            scheduled_at: model.scheduled_at,
            kind: model.kind,
            status: Some(model.status),
            notes: model.notes,
        }
    }
}
