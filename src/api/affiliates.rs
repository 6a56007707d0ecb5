use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::json;

use crate::models::affiliate::{self, Entity as Affiliate};
use crate::models::referral::{self, Entity as Referral};
use crate::state::AppState;

pub async fn list_affiliates(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    match Affiliate::find()
        .order_by_asc(affiliate::Column::Name)
        .all(&db)
        .await
    {
        Ok(affiliates) => {
            Json(json!({ "affiliates": affiliates, "total": affiliates.len() })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn get_affiliate(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let affiliate = match Affiliate::find_by_id(id).one(&db).await {
        Ok(Some(affiliate)) => affiliate,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Affiliate not found" })),
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

    let visits = Referral::find()
        .filter(referral::Column::AffiliateId.eq(id))
        .count(&db)
        .await
        .unwrap_or(0);
    let conversions = Referral::find()
        .filter(referral::Column::AffiliateId.eq(id))
        .filter(referral::Column::Converted.eq(true))
        .count(&db)
        .await
        .unwrap_or(0);

    Json(json!({
        "affiliate": affiliate,
        "visits": visits,
        "conversions": conversions,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct CreateAffiliateRequest {
    pub name: String,
    pub email: String,
    pub code: Option<String>,
    pub commission_rate: Option<f64>,
}

/// Fallback referral code: lowercase name prefix plus a short random suffix.
fn generate_code(name: &str) -> String {
    let prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_lowercase();
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..6];
    format!("{}-{}", prefix, suffix)
}

pub async fn create_affiliate(
    State(db): State<DatabaseConnection>,
    Json(request): Json<CreateAffiliateRequest>,
) -> impl IntoResponse {
    if request.name.trim().is_empty() || request.email.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Name and email are required" })),
        )
            .into_response();
    }

    let code = request
        .code
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| generate_code(&request.name));

    let exists = Affiliate::find()
        .filter(affiliate::Column::Code.eq(code.clone()))
        .one(&db)
        .await
        .unwrap_or(None);
    if exists.is_some() {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Affiliate code already in use" })),
        )
            .into_response();
    }

    let now = chrono::Utc::now().to_rfc3339();
    let new_affiliate = affiliate::ActiveModel {
        name: Set(request.name),
        email: Set(request.email),
        code: Set(code),
        commission_rate: Set(request.commission_rate.unwrap_or(0.05)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_affiliate.insert(&db).await {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "affiliate": model,
                "message": "Affiliate created successfully"
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

pub async fn list_referrals(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Referral::find()
        .filter(referral::Column::AffiliateId.eq(id))
        .order_by_desc(referral::Column::CreatedAt)
        .all(&db)
        .await
    {
        Ok(referrals) => {
            let earned: f64 = referrals.iter().map(|r| r.commission_amount).sum();
            Json(json!({
                "referrals": referrals,
                "total": referrals.len(),
                "commission_earned": earned,
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

#[derive(Debug, Deserialize)]
pub struct TrackVisitQuery {
    pub url: Option<String>,
}

/// Public referral link. Records the visit when the code is known and
/// always redirects, valid code or not.
pub async fn track_visit(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<TrackVisitQuery>,
) -> impl IntoResponse {
    let target = params
        .url
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .unwrap_or_else(|| state.config.fallback_redirect_url.clone());

    match Affiliate::find()
        .filter(affiliate::Column::Code.eq(code.clone()))
        .one(state.db())
        .await
    {
        Ok(Some(affiliate)) => {
            let visit = referral::ActiveModel {
                affiliate_id: Set(affiliate.id),
                lead_id: Set(None),
                target_url: Set(Some(target.clone())),
                converted: Set(false),
                commission_amount: Set(0.0),
                created_at: Set(chrono::Utc::now().to_rfc3339()),
                ..Default::default()
            };
            if let Err(e) = visit.insert(state.db()).await {
                tracing::warn!("Failed to record referral visit for {}: {}", code, e);
            }
        }
        Ok(None) => tracing::debug!("Referral visit with unknown code: {}", code),
        Err(e) => tracing::warn!("Referral lookup failed for {}: {}", code, e),
    }

    (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
}
