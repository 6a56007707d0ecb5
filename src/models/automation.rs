use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A declarative automation: a trigger plus one typed action. The action
/// column holds the serialized `services::automation_service::Action`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "automations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// lead_created
    pub trigger: String,
    /// JSON-encoded typed action
    pub action: String,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
