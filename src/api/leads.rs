use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use serde_json::json;

use crate::models::lead::{self, Entity as Lead, LeadDto};
use crate::services::lead_service;
use crate::state::AppState;

use super::error_response;

#[derive(Debug, Deserialize)]
pub struct LeadsQuery {
    pub status: Option<String>,
    pub source: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/leads",
    responses(
        (status = 200, description = "List leads")
    )
)]
pub async fn list_leads(
    State(db): State<DatabaseConnection>,
    Query(params): Query<LeadsQuery>,
) -> impl IntoResponse {
    let mut query = Lead::find().order_by_desc(lead::Column::CreatedAt);

    if let Some(status) = params.status {
        query = query.filter(lead::Column::Status.eq(status));
    }
    if let Some(source) = params.source {
        query = query.filter(lead::Column::Source.eq(source));
    }

    match query.all(&db).await {
        Ok(leads) => {
            let lead_dtos: Vec<LeadDto> = leads.into_iter().map(LeadDto::from).collect();
            Json(json!({
                "leads": lead_dtos,
                "total": lead_dtos.len()
            }))
            .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn get_lead(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Lead::find_by_id(id).one(&db).await {
        Ok(Some(lead)) => Json(json!({ "lead": LeadDto::from(lead) })).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Lead not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    #[serde(flatten)]
    pub lead: LeadDtoInput,
    /// IANA-style timezone name used for campaign scheduling
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeadDtoInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
    pub project_type: Option<String>,
    pub budget: Option<f64>,
    pub message: Option<String>,
    pub affiliate_code: Option<String>,
}

fn default_source() -> String {
    "form".to_string()
}

#[utoipa::path(
    post,
    path = "/api/leads",
    responses(
        (status = 201, description = "Lead captured and auto-enrolled"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_lead(
    State(state): State<AppState>,
    Json(request): Json<CreateLeadRequest>,
) -> impl IntoResponse {
    let dto = LeadDto {
        id: None,
        name: request.lead.name,
        email: request.lead.email,
        phone: request.lead.phone,
        source: request.lead.source,
        project_type: request.lead.project_type,
        budget: request.lead.budget,
        message: request.lead.message,
        status: "new".to_string(),
        affiliate_code: request.lead.affiliate_code,
        created_at: None,
    };

    let errors = lead_service::validate(&dto);
    if !errors.is_empty() {
        let fields: serde_json::Map<String, serde_json::Value> = errors
            .into_iter()
            .map(|(field, message)| (field.to_string(), json!(message)))
            .collect();
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Validation failed", "errors": fields })),
        )
            .into_response();
    }

    let timezone = request.timezone.as_deref().unwrap_or("UTC");

    match lead_service::create_lead(
        state.db(),
        state.mailer.as_ref(),
        &state.http,
        state.config.notify_email.as_deref(),
        dto,
        timezone,
    )
    .await
    {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "lead": LeadDto::from(model),
                "message": "Lead captured successfully"
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn update_lead_status(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    match lead_service::update_status(&db, id, &request.status).await {
        Ok(model) => Json(json!({ "lead": LeadDto::from(model) })).into_response(),
        Err(e) => error_response(e),
    }
}
