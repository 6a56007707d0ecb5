use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AdminKey;
use crate::state::AppState;

use super::error_response;

/// Kicks off a deployment in the background and returns its id immediately.
/// At most one deployment runs at a time; a second trigger gets 409.
pub async fn trigger_deploy(_key: AdminKey, State(state): State<AppState>) -> impl IntoResponse {
    match state.deploys.trigger() {
        Ok(id) => (
            StatusCode::ACCEPTED,
            Json(json!({ "id": id, "message": "Deployment started" })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn deploy_status(
    _key: AdminKey,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.deploys.status(&id) {
        Some(deployment) => Json(json!({ "deployment": deployment })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Deployment not found" })),
        )
            .into_response(),
    }
}
