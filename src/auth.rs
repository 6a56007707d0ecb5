//! Admin API-key gate. Every /api/admin route extracts `AdminKey`, which
//! checks the bearer token against ADMIN_API_KEY: 401 when the header is
//! missing or malformed, 500 when no key is configured, 403 on mismatch.

use std::env;

use axum::{
    async_trait,
    extract::{FromRequestParts, Json},
    http::{request::Parts, StatusCode},
};
use serde_json::json;

pub struct AdminKey;

#[async_trait]
impl<S> FromRequestParts<S> for AdminKey
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            ))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        ))?;

        let expected = env::var("ADMIN_API_KEY").map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Admin API key is not configured" })),
            )
        })?;

        if token != expected {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Forbidden" })),
            ));
        }

        Ok(AdminKey)
    }
}
