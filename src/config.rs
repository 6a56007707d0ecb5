use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// Public base URL, used to build tracking links in campaign emails
    pub base_url: String,
    /// Where click-tracking redirects land when no target URL was given
    pub fallback_redirect_url: String,
    pub campaign_interval_secs: u64,
    pub smtp: Option<SmtpConfig>,
    /// Sales inbox for new-lead notifications; unset means no fanout
    pub notify_email: Option<String>,
    pub deploy: DeployConfig,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Clone)]
pub struct DeployConfig {
    pub repo_dir: String,
    /// Command that restarts the running service, e.g. "systemctl restart poolside"
    pub restart_cmd: String,
    pub health_url: String,
    pub health_check_retries: u32,
    pub health_check_interval_secs: u64,
    pub auto_rollback: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://poolside.db?mode=rwc".to_string());

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        // SMTP is optional; when any piece is missing we fall back to the
        // logging mailer instead of failing startup.
        let smtp = match (
            env::var("SMTP_HOST"),
            env::var("SMTP_USERNAME"),
            env::var("SMTP_PASSWORD"),
        ) {
            (Ok(host), Ok(username), Ok(password)) => Some(SmtpConfig {
                from: env::var("SMTP_FROM").unwrap_or_else(|_| username.clone()),
                host,
                username,
                password,
            }),
            _ => None,
        };

        Self {
            database_url,
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(Vec::new),
            fallback_redirect_url: env::var("FALLBACK_REDIRECT_URL")
                .unwrap_or_else(|_| base_url.clone()),
            base_url,
            campaign_interval_secs: env::var("CAMPAIGN_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            smtp,
            notify_email: env::var("NOTIFY_EMAIL").ok(),
            deploy: DeployConfig {
                repo_dir: env::var("DEPLOY_REPO_DIR").unwrap_or_else(|_| ".".to_string()),
                restart_cmd: env::var("DEPLOY_RESTART_CMD")
                    .unwrap_or_else(|_| "systemctl restart poolside".to_string()),
                health_url: env::var("DEPLOY_HEALTH_URL")
                    .unwrap_or_else(|_| "http://localhost:8000/api/health".to_string()),
                health_check_retries: env::var("DEPLOY_HEALTH_RETRIES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
                health_check_interval_secs: env::var("DEPLOY_HEALTH_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                auto_rollback: env::var("DEPLOY_AUTO_ROLLBACK")
                    .map(|v| v != "false" && v != "0")
                    .unwrap_or(true),
            },
        }
    }
}
