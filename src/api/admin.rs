use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AdminKey;
use crate::models::affiliate::Entity as Affiliate;
use crate::models::appointment::Entity as Appointment;
use crate::models::automation::{self, Entity as Automation};
use crate::models::campaign_history::{self, Entity as CampaignHistory};
use crate::models::email_campaign::{self, Entity as EmailCampaign};
use crate::models::lead::{self, Entity as Lead, LeadDto};
use crate::models::referral::Entity as Referral;
use crate::services::automation_service::{self, Action};
use crate::services::{lead_service, ServiceError};
use crate::state::AppState;

use super::error_response;

pub async fn list_leads(_key: AdminKey, State(db): State<DatabaseConnection>) -> impl IntoResponse {
    match Lead::find()
        .order_by_desc(lead::Column::CreatedAt)
        .all(&db)
        .await
    {
        Ok(leads) => {
            let dtos: Vec<LeadDto> = leads.into_iter().map(LeadDto::from).collect();
            Json(json!({ "leads": dtos, "total": dtos.len() })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

/// Deletes the lead plus its campaigns, history, and appointments.
async fn delete_lead_cascade(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    Lead::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    CampaignHistory::delete_many()
        .filter(campaign_history::Column::LeadId.eq(id))
        .exec(db)
        .await?;
    EmailCampaign::delete_many()
        .filter(email_campaign::Column::LeadId.eq(id))
        .exec(db)
        .await?;
    Appointment::delete_many()
        .filter(crate::models::appointment::Column::LeadId.eq(id))
        .exec(db)
        .await?;
    Lead::delete_by_id(id).exec(db).await?;
    Ok(())
}

pub async fn delete_lead(
    _key: AdminKey,
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match delete_lead_cascade(&db, id).await {
        Ok(()) => Json(json!({ "message": "Lead deleted successfully" })).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i32>,
}

pub async fn bulk_delete_leads(
    _key: AdminKey,
    State(db): State<DatabaseConnection>,
    Json(request): Json<BulkDeleteRequest>,
) -> impl IntoResponse {
    let mut deleted = 0;
    let mut failures = Vec::new();

    for id in request.ids {
        match delete_lead_cascade(&db, id).await {
            Ok(()) => deleted += 1,
            Err(ServiceError::NotFound) => failures.push(json!({ "id": id, "error": "Not found" })),
            Err(e) => failures.push(json!({ "id": id, "error": format!("{:?}", e) })),
        }
    }

    Json(json!({ "deleted": deleted, "failures": failures })).into_response()
}

pub async fn stats(_key: AdminKey, State(db): State<DatabaseConnection>) -> impl IntoResponse {
    match lead_service::stats(&db).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => error_response(e),
    }
}

/// Full JSON dump of every table, for offline backup.
pub async fn export(_key: AdminKey, State(db): State<DatabaseConnection>) -> impl IntoResponse {
    let leads = Lead::find().all(&db).await;
    let appointments = Appointment::find().all(&db).await;
    let affiliates = Affiliate::find().all(&db).await;
    let referrals = Referral::find().all(&db).await;
    let campaigns = EmailCampaign::find().all(&db).await;
    let history = CampaignHistory::find().all(&db).await;
    let automations = Automation::find().all(&db).await;

    match (
        leads,
        appointments,
        affiliates,
        referrals,
        campaigns,
        history,
        automations,
    ) {
        (
            Ok(leads),
            Ok(appointments),
            Ok(affiliates),
            Ok(referrals),
            Ok(campaigns),
            Ok(history),
            Ok(automations),
        ) => Json(json!({
            "exported_at": chrono::Utc::now().to_rfc3339(),
            "leads": leads,
            "appointments": appointments,
            "affiliates": affiliates,
            "referrals": referrals,
            "campaigns": campaigns,
            "campaign_history": history,
            "automations": automations,
        }))
        .into_response(),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Export failed" })),
        )
            .into_response(),
    }
}

pub async fn list_automations(
    _key: AdminKey,
    State(db): State<DatabaseConnection>,
) -> impl IntoResponse {
    match Automation::find()
        .order_by_asc(automation::Column::Id)
        .all(&db)
        .await
    {
        Ok(automations) => {
            Json(json!({ "automations": automations, "total": automations.len() }))
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAutomationRequest {
    pub name: String,
    pub trigger: String,
    pub action: Action,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub async fn create_automation(
    _key: AdminKey,
    State(db): State<DatabaseConnection>,
    Json(request): Json<CreateAutomationRequest>,
) -> impl IntoResponse {
    if request.trigger != "lead_created" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Unknown trigger: {}", request.trigger) })),
        )
            .into_response();
    }

    let action = match serde_json::to_string(&request.action) {
        Ok(action) => action,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid action: {}", e) })),
            )
                .into_response()
        }
    };

    let now = chrono::Utc::now().to_rfc3339();
    let new_automation = automation::ActiveModel {
        name: Set(request.name),
        trigger: Set(request.trigger),
        action: Set(action),
        enabled: Set(request.enabled),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_automation.insert(&db).await {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "automation": model,
                "message": "Automation created successfully"
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn delete_automation(
    _key: AdminKey,
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Automation::find_by_id(id).one(&db).await {
        Ok(Some(_)) => match Automation::delete_by_id(id).exec(&db).await {
            Ok(_) => Json(json!({ "message": "Automation deleted successfully" })).into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "details": e.to_string() })),
            )
                .into_response(),
        },
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Automation not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

/// Manual run from the dashboard. No triggering lead, so actions that need
/// one (e.g. an email without an explicit recipient) fail with 400.
pub async fn run_automation(
    _key: AdminKey,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let row = match Automation::find_by_id(id).one(state.db()).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Automation not found" })),
            )
                .into_response()
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "details": e.to_string() })),
            )
                .into_response()
        }
    };

    let action: Action = match serde_json::from_str(&row.action) {
        Ok(action) => action,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Stored action is invalid: {}", e) })),
            )
                .into_response()
        }
    };

    match automation_service::run_action(
        state.db(),
        state.mailer.as_ref(),
        &state.http,
        &action,
        None,
    )
    .await
    {
        Ok(result) => Json(json!({ "automation": row.name, "result": result })).into_response(),
        Err(e) => error_response(e),
    }
}
