use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use poolside::config::{Config, DeployConfig};
use poolside::db;
use poolside::services::deploy_service::{DeployManager, ShellRunner};
use poolside::services::mailer::LogMailer;
use poolside::state::AppState;
use poolside::api;
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

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn capturing_a_lead_auto_enrolls_the_nurture_campaign() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/leads",
            serde_json::json!({
                "name": "Jamie Rivera",
                "email": "jamie@example.com",
                "phone": "555-0100",
                "project_type": "inground",
                "budget": 45000.0,
                "timezone": "America/Chicago"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["lead"]["email"], "jamie@example.com");
    assert_eq!(body["lead"]["status"], "new");
    let lead_id = body["lead"]["id"].as_i64().unwrap();

    // Intake enrolls the lead into the nurture sequence
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/campaigns?lead_id={}", lead_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["campaigns"][0]["campaign_type"], "new_lead_nurture");
    assert_eq!(body["campaigns"][0]["status"], "active");
    assert_eq!(body["campaigns"][0]["timezone"], "America/Chicago");
}

#[tokio::test]
async fn invalid_lead_gets_field_level_errors() {
    let app = setup_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/leads",
            serde_json::json!({
                "name": "",
                "email": "not-an-email",
                "budget": -5.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Validation failed");
    assert!(body["errors"]["name"].is_string());
    assert!(body["errors"]["email"].is_string());
    assert!(body["errors"]["budget"].is_string());
}

#[tokio::test]
async fn lead_status_transitions_are_validated() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/leads",
            serde_json::json!({ "name": "Sam", "email": "sam@example.com" }),
        ))
        .await
        .unwrap();
    let lead_id = json_body(response).await["lead"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/leads/{}/status", lead_id),
            serde_json::json!({ "status": "contacted" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["lead"]["status"], "contacted");

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/leads/{}/status", lead_id),
            serde_json::json!({ "status": "definitely-not-a-status" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lead_with_affiliate_code_converts_the_referral() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/affiliates",
            serde_json::json!({
                "name": "Desert Pools Blog",
                "email": "blog@example.com",
                "code": "desert10",
                "commission_rate": 0.1
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let affiliate_id = json_body(response).await["affiliate"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/leads",
            serde_json::json!({
                "name": "Robin",
                "email": "robin@example.com",
                "budget": 20000.0,
                "affiliate_code": "desert10"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/affiliates/{}/referrals", affiliate_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["referrals"][0]["converted"], true);
    // 10% of the 20k budget
    assert_eq!(body["commission_earned"], 2000.0);
}
