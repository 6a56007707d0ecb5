pub mod admin;
pub mod affiliates;
pub mod appointments;
pub mod campaigns;
pub mod deploy;
pub mod health;
pub mod leads;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;

use crate::services::ServiceError;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Leads (public capture + CRM)
        .route("/leads", get(leads::list_leads).post(leads::create_lead))
        .route("/leads/:id", get(leads::get_lead))
        .route("/leads/:id/status", put(leads::update_lead_status))
        // Appointments
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/appointments/:id",
            get(appointments::get_appointment)
                .put(appointments::update_appointment)
                .delete(appointments::delete_appointment),
        )
        // Affiliates & referral tracking
        .route(
            "/affiliates",
            get(affiliates::list_affiliates).post(affiliates::create_affiliate),
        )
        .route("/affiliates/:id", get(affiliates::get_affiliate))
        .route(
            "/affiliates/:id/referrals",
            get(affiliates::list_referrals),
        )
        .route("/affiliates/track/:code", get(affiliates::track_visit))
        // Campaigns
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns/enroll", post(campaigns::enroll))
        .route("/campaigns/:id", get(campaigns::get_campaign))
        .route("/campaigns/:id/history", get(campaigns::get_history))
        .route("/campaigns/:id/pause", post(campaigns::pause))
        .route("/campaigns/:id/resume", post(campaigns::resume))
        .route("/campaigns/:id/unsubscribe", post(campaigns::unsubscribe))
        // Email tracking (must always answer 200/302, see handlers)
        .route("/campaigns/track/open/:history_id", get(campaigns::track_open))
        .route(
            "/campaigns/track/click/:history_id",
            get(campaigns::track_click),
        )
        // Admin (bearer-key gated via the AdminKey extractor)
        .route("/admin/leads", get(admin::list_leads))
        .route("/admin/leads/bulk-delete", post(admin::bulk_delete_leads))
        .route("/admin/leads/:id", delete(admin::delete_lead))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/export", get(admin::export))
        .route(
            "/admin/automations",
            get(admin::list_automations).post(admin::create_automation),
        )
        .route("/admin/automations/:id", delete(admin::delete_automation))
        .route("/admin/automations/:id/run", post(admin::run_automation))
        .route("/admin/deploy", post(deploy::trigger_deploy))
        .route("/admin/deploy/:id", get(deploy::deploy_status))
        .with_state(state)
}

/// Translate service errors into the flat HTTP taxonomy.
pub(crate) fn error_response(e: ServiceError) -> Response {
    match e {
        ServiceError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Not found" })),
        )
            .into_response(),
        ServiceError::Conflict(msg) => {
            (StatusCode::CONFLICT, Json(json!({ "error": msg }))).into_response()
        }
        ServiceError::InvalidState(msg) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        ServiceError::Database(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": msg })),
        )
            .into_response(),
    }
}
