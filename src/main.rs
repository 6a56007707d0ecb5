use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poolside::services::deploy_service::{DeployManager, ShellRunner};
use poolside::services::mailer::{LogMailer, Mailer, SmtpMailer};
use poolside::{api, api_docs, config, db, scheduler, state};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poolside=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let config = Arc::new(config::Config::from_env());

    let db = db::init_db(&config.database_url)
        .await
        .expect("Failed to initialize database");

    // SMTP when configured, otherwise log-only delivery
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => match SmtpMailer::new(smtp) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                tracing::error!("SMTP setup failed, falling back to log mailer: {}", e);
                Arc::new(LogMailer)
            }
        },
        None => {
            tracing::warn!("SMTP not configured, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let deploys = Arc::new(DeployManager::new(
        Arc::new(ShellRunner),
        config.deploy.clone(),
    ));

    let processor = scheduler::CampaignProcessor::start(
        db.clone(),
        mailer.clone(),
        Duration::from_secs(config.campaign_interval_secs),
    );

    let app_state = state::AppState::new(db, mailer, deploys, config.clone());
    let api_router = api::api_router(app_state);

    let mut cors_allowed_origins = Vec::new();
    for origin in &config.cors_allowed_origins {
        match origin.parse::<axum::http::HeaderValue>() {
            Ok(v) => cors_allowed_origins.push(v),
            Err(e) => tracing::error!("Failed to parse CORS origin '{}': {}", origin, e),
        }
    }

    let app = axum::Router::new()
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", api_docs::ApiDoc::openapi()))
        .nest("/api", api_router)
        .layer(
            CorsLayer::new()
                .allow_origin(cors_allowed_origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Poolside server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");

    processor.stop();
}
