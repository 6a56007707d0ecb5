use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::json;

use crate::models::campaign_history::{self, Entity as CampaignHistory};
use crate::models::email_campaign::{self, CampaignDto, Entity as EmailCampaign};
use crate::services::campaign_service;
use crate::state::AppState;

use super::error_response;

/// 1x1 transparent GIF, served by the open-tracking pixel.
const TRACKING_PIXEL: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

#[derive(Debug, Deserialize)]
pub struct CampaignsQuery {
    pub lead_id: Option<i32>,
    pub status: Option<String>,
}

pub async fn list_campaigns(
    State(db): State<DatabaseConnection>,
    Query(params): Query<CampaignsQuery>,
) -> impl IntoResponse {
    let mut query = EmailCampaign::find().order_by_desc(email_campaign::Column::EnrolledAt);

    if let Some(lead_id) = params.lead_id {
        query = query.filter(email_campaign::Column::LeadId.eq(lead_id));
    }
    if let Some(status) = params.status {
        query = query.filter(email_campaign::Column::Status.eq(status));
    }

    match query.all(&db).await {
        Ok(campaigns) => {
            let dtos: Vec<CampaignDto> = campaigns.into_iter().map(CampaignDto::from).collect();
            Json(json!({ "campaigns": dtos, "total": dtos.len() })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn get_campaign(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match EmailCampaign::find_by_id(id).one(&db).await {
        Ok(Some(model)) => Json(json!({ "campaign": CampaignDto::from(model) })).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Campaign not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn get_history(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match CampaignHistory::find()
        .filter(campaign_history::Column::CampaignId.eq(id))
        .order_by_asc(campaign_history::Column::StepNumber)
        .all(&db)
        .await
    {
        Ok(history) => Json(json!({ "history": history, "total": history.len() })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub lead_id: i32,
    pub campaign_type: String,
    pub timezone: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/campaigns/enroll",
    responses(
        (status = 201, description = "Lead enrolled"),
        (status = 404, description = "Lead not found"),
        (status = 409, description = "Lead already has an active campaign")
    )
)]
pub async fn enroll(
    State(db): State<DatabaseConnection>,
    Json(request): Json<EnrollRequest>,
) -> impl IntoResponse {
    let timezone = request.timezone.as_deref().unwrap_or("UTC");
    match campaign_service::enroll(&db, request.lead_id, &request.campaign_type, timezone).await {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "campaign": CampaignDto::from(model),
                "message": "Lead enrolled successfully"
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn pause(State(db): State<DatabaseConnection>, Path(id): Path<i32>) -> impl IntoResponse {
    match campaign_service::pause(&db, id).await {
        Ok(model) => Json(json!({ "campaign": CampaignDto::from(model) })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn resume(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match campaign_service::resume(&db, id).await {
        Ok(model) => Json(json!({ "campaign": CampaignDto::from(model) })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn unsubscribe(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match campaign_service::unsubscribe(&db, id).await {
        Ok(model) => Json(json!({
            "campaign": CampaignDto::from(model),
            "message": "Unsubscribed"
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// Open-tracking pixel. Always answers 200 with the GIF, whatever happens;
/// a broken image in a customer's inbox is worse than a lost data point.
pub async fn track_open(
    State(db): State<DatabaseConnection>,
    Path(history_id): Path<i32>,
) -> impl IntoResponse {
    match CampaignHistory::find_by_id(history_id).one(&db).await {
        Ok(Some(row)) if row.opened_at.is_none() => {
            let mut active: campaign_history::ActiveModel = row.into();
            active.opened_at = Set(Some(chrono::Utc::now().to_rfc3339()));
            if let Err(e) = active.update(&db).await {
                tracing::warn!("Failed to record open for history {}: {}", history_id, e);
            }
        }
        // First open wins; repeat opens keep the original timestamp
        Ok(Some(_)) => {}
        Ok(None) => tracing::debug!("Open ping for unknown history row {}", history_id),
        Err(e) => tracing::warn!("Open lookup failed for history {}: {}", history_id, e),
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        TRACKING_PIXEL,
    )
}

#[derive(Debug, Deserialize)]
pub struct TrackClickQuery {
    pub url: Option<String>,
}

/// Click-tracking redirect. Records the click when possible, then always
/// redirects so the customer lands somewhere sensible.
pub async fn track_click(
    State(state): State<AppState>,
    Path(history_id): Path<i32>,
    Query(params): Query<TrackClickQuery>,
) -> impl IntoResponse {
    let target = params
        .url
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .unwrap_or_else(|| state.config.fallback_redirect_url.clone());

    match CampaignHistory::find_by_id(history_id).one(state.db()).await {
        Ok(Some(row)) if row.clicked_at.is_none() => {
            let mut active: campaign_history::ActiveModel = row.into();
            active.clicked_at = Set(Some(chrono::Utc::now().to_rfc3339()));
            active.clicked_url = Set(Some(target.clone()));
            if let Err(e) = active.update(state.db()).await {
                tracing::warn!("Failed to record click for history {}: {}", history_id, e);
            }
        }
        Ok(Some(_)) => {}
        Ok(None) => tracing::debug!("Click for unknown history row {}", history_id),
        Err(e) => tracing::warn!("Click lookup failed for history {}: {}", history_id, e),
    }

    (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
}
