use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use poolside::api;
use poolside::config::{Config, DeployConfig};
use poolside::db;
use poolside::services::deploy_service::{DeployManager, ShellRunner};
use poolside::services::mailer::LogMailer;
use poolside::state::AppState;
use serial_test::serial;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        cors_allowed_origins: Vec::new(),
        base_url: "http://localhost:8000".to_string(),
        fallback_redirect_url: "https://pools.example.com".to_string(),
        campaign_interval_secs: 300,
        smtp: None,
        notify_email: None,
        deploy: DeployConfig {
            repo_dir: ".".to_string(),
            restart_cmd: "true".to_string(),
            health_url: "http://localhost:8000/api/health".to_string(),
            health_check_retries: 0,
            health_check_interval_secs: 1,
            auto_rollback: false,
        },
    }
}

async fn setup_app() -> Router {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let config = Arc::new(test_config());
    let deploys = Arc::new(DeployManager::new(
        Arc::new(ShellRunner),
        config.deploy.clone(),
    ));
    let state = AppState::new(db, Arc::new(LogMailer), deploys, config);
    api::api_router(state)
}

fn admin_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
#[serial]
async fn admin_routes_require_a_bearer_token() {
    std::env::set_var("ADMIN_API_KEY", "sekrit");
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(admin_request("/admin/leads", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Non-bearer scheme counts as missing
    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/leads")
                .header(header::AUTHORIZATION, "Basic c2Vrcml0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn wrong_key_is_forbidden() {
    std::env::set_var("ADMIN_API_KEY", "sekrit");
    let app = setup_app().await;

    let response = app
        .oneshot(admin_request("/admin/leads", Some("wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn correct_key_is_accepted() {
    std::env::set_var("ADMIN_API_KEY", "sekrit");
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(admin_request("/admin/leads", Some("sekrit")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 0);

    let response = app
        .oneshot(admin_request("/admin/stats", Some("sekrit")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["leads"]["total"], 0);
}

#[tokio::test]
#[serial]
async fn unconfigured_key_is_a_server_error() {
    std::env::remove_var("ADMIN_API_KEY");
    let app = setup_app().await;

    let response = app
        .oneshot(admin_request("/admin/leads", Some("anything")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
#[serial]
async fn public_routes_do_not_require_the_key() {
    std::env::set_var("ADMIN_API_KEY", "sekrit");
    let app = setup_app().await;

    let response = app
        .oneshot(admin_request("/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
