//! Application state shared across all handlers. Everything that used to
//! be a module-level singleton in earlier iterations lives here and is
//! passed through dependency injection.

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::services::deploy_service::DeployManager;
use crate::services::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub mailer: Arc<dyn Mailer>,
    pub deploys: Arc<DeployManager>,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        mailer: Arc<dyn Mailer>,
        deploys: Arc<DeployManager>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            mailer,
            deploys,
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

// Allow CRUD handlers to extract the bare DatabaseConnection
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
