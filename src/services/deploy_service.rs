//! Deployment manager: one fixed pipeline at a time, tracked in memory.
//! The "current deployment" pointer is a store-enforced compare-and-swap;
//! a second trigger is rejected while one is pending or in progress.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::config::DeployConfig;
use crate::services::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    RolledBack,
}

impl DeployStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeployStatus::Success | DeployStatus::Failed | DeployStatus::RolledBack
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    pub id: Uuid,
    pub status: DeployStatus,
    pub log: Vec<String>,
    pub previous_version: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

/// Seam over shell execution so the pipeline is testable without git or a
/// service manager on the box.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, dir: &str, program: &str, args: &[&str]) -> Result<String, String>;
}

pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, dir: &str, program: &str, args: &[&str]) -> Result<String, String> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| format!("{} failed to start: {}", program, e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(format!(
                "{} {} exited with {}: {}",
                program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

pub struct DeployManager {
    deployments: DashMap<Uuid, Deployment>,
    current: Mutex<Option<Uuid>>,
    runner: Arc<dyn CommandRunner>,
    http: reqwest::Client,
    config: DeployConfig,
}

impl DeployManager {
    pub fn new(runner: Arc<dyn CommandRunner>, config: DeployConfig) -> Self {
        Self {
            deployments: DashMap::new(),
            current: Mutex::new(None),
            runner,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Start a deployment and return its tracking id immediately; the
    /// pipeline runs in a detached task and clients poll `status`.
    pub fn trigger(self: &Arc<Self>) -> Result<Uuid, ServiceError> {
        let id = {
            let mut current = self
                .current
                .lock()
                .map_err(|_| ServiceError::InvalidState("deployment lock poisoned".to_string()))?;

            if let Some(active_id) = *current {
                let still_running = self
                    .deployments
                    .get(&active_id)
                    .map(|d| !d.status.is_terminal())
                    .unwrap_or(false);
                if still_running {
                    return Err(ServiceError::Conflict(format!(
                        "Deployment {} is already in progress",
                        active_id
                    )));
                }
            }

            let id = Uuid::new_v4();
            self.deployments.insert(
                id,
                Deployment {
                    id,
                    status: DeployStatus::Pending,
                    log: vec!["Deployment queued".to_string()],
                    previous_version: None,
                    started_at: Utc::now().to_rfc3339(),
                    finished_at: None,
                },
            );
            *current = Some(id);
            id
        };

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_pipeline(id).await;
        });

        Ok(id)
    }

    pub fn status(&self, id: &Uuid) -> Option<Deployment> {
        self.deployments.get(id).map(|d| d.clone())
    }

    fn log(&self, id: Uuid, line: &str) {
        tracing::info!("deploy {}: {}", id, line);
        if let Some(mut deployment) = self.deployments.get_mut(&id) {
            deployment.log.push(line.to_string());
        }
    }

    fn set_status(&self, id: Uuid, status: DeployStatus) {
        if let Some(mut deployment) = self.deployments.get_mut(&id) {
            deployment.status = status;
            if status.is_terminal() {
                deployment.finished_at = Some(Utc::now().to_rfc3339());
            }
        }
    }

    async fn run_pipeline(&self, id: Uuid) {
        self.set_status(id, DeployStatus::InProgress);

        match self.run_steps(id).await {
            Ok(()) => {
                self.log(id, "Deployment succeeded");
                self.set_status(id, DeployStatus::Success);
            }
            Err(e) => {
                self.log(id, &format!("Deployment failed: {}", e));
                if self.config.auto_rollback {
                    // Rollback failures are logged, never re-thrown
                    match self.rollback(id).await {
                        Ok(()) => {
                            self.log(id, "Rolled back to previous version");
                            self.set_status(id, DeployStatus::RolledBack);
                        }
                        Err(re) => {
                            self.log(id, &format!("Rollback failed: {}", re));
                            self.set_status(id, DeployStatus::Failed);
                        }
                    }
                } else {
                    self.set_status(id, DeployStatus::Failed);
                }
            }
        }
    }

    async fn run_steps(&self, id: Uuid) -> Result<(), String> {
        let dir = self.config.repo_dir.clone();

        // Record the version we can roll back to before touching anything
        let version = self
            .runner
            .run(&dir, "git", &["rev-parse", "HEAD"])
            .await?;
        if let Some(mut deployment) = self.deployments.get_mut(&id) {
            deployment.previous_version = Some(version.clone());
        }
        self.log(id, &format!("Current version {}", version));

        self.log(id, "Pulling latest changes");
        self.runner.run(&dir, "git", &["pull"]).await?;

        self.log(id, "Building release binary");
        self.runner
            .run(&dir, "cargo", &["build", "--release"])
            .await?;

        self.restart(id, &dir).await?;
        self.health_check(id).await
    }

    async fn restart(&self, id: Uuid, dir: &str) -> Result<(), String> {
        self.log(id, "Restarting service");
        let mut parts = self.config.restart_cmd.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| "restart command is empty".to_string())?;
        let args: Vec<&str> = parts.collect();
        self.runner.run(dir, program, &args).await.map(|_| ())
    }

    async fn health_check(&self, id: Uuid) -> Result<(), String> {
        if self.config.health_check_retries == 0 {
            self.log(id, "Health checks disabled");
            return Ok(());
        }

        for attempt in 1..=self.config.health_check_retries {
            tokio::time::sleep(Duration::from_secs(self.config.health_check_interval_secs)).await;

            match self.http.get(&self.config.health_url).send().await {
                Ok(response) if response.status().is_success() => {
                    self.log(id, &format!("Health check passed (attempt {})", attempt));
                    return Ok(());
                }
                Ok(response) => self.log(
                    id,
                    &format!(
                        "Health check attempt {} returned {}",
                        attempt,
                        response.status()
                    ),
                ),
                Err(e) => self.log(id, &format!("Health check attempt {} failed: {}", attempt, e)),
            }
        }

        Err(format!(
            "Service never became healthy after {} checks",
            self.config.health_check_retries
        ))
    }

    async fn rollback(&self, id: Uuid) -> Result<(), String> {
        let previous = self
            .deployments
            .get(&id)
            .and_then(|d| d.previous_version.clone())
            .ok_or_else(|| "No previous version recorded".to_string())?;

        let dir = self.config.repo_dir.clone();
        self.log(id, &format!("Rolling back to {}", previous));
        self.runner
            .run(&dir, "git", &["checkout", &previous])
            .await?;
        self.runner
            .run(&dir, "cargo", &["build", "--release"])
            .await?;
        self.restart(id, &dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Semaphore;

    fn test_config() -> DeployConfig {
        DeployConfig {
            repo_dir: ".".to_string(),
            restart_cmd: "systemctl restart poolside".to_string(),
            health_url: "http://localhost:1/health".to_string(),
            // Health checks are exercised through the runner seam, not a
            // live HTTP server
            health_check_retries: 0,
            health_check_interval_secs: 0,
            auto_rollback: true,
        }
    }

    /// Records every call; fails any call whose "program args" rendering
    /// starts with `fail_on`.
    struct ScriptedRunner {
        fail_on: Option<&'static str>,
        calls: StdMutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn ok() -> Self {
            Self {
                fail_on: None,
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn failing_on(step: &'static str) -> Self {
            Self {
                fail_on: Some(step),
                calls: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, _dir: &str, program: &str, args: &[&str]) -> Result<String, String> {
            let call = format!("{} {}", program, args.join(" "));
            self.calls.lock().unwrap().push(call.clone());
            if let Some(fail_on) = self.fail_on {
                if call.starts_with(fail_on) {
                    return Err(format!("{} broke", fail_on));
                }
            }
            Ok("abc1234".to_string())
        }
    }

    /// Blocks every call until permits are released, to hold a deployment
    /// in progress.
    struct BlockingRunner {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl CommandRunner for BlockingRunner {
        async fn run(&self, _dir: &str, _program: &str, _args: &[&str]) -> Result<String, String> {
            let _permit = self.gate.acquire().await.map_err(|e| e.to_string())?;
            Ok("abc1234".to_string())
        }
    }

    async fn wait_for_terminal(manager: &DeployManager, id: Uuid) -> Deployment {
        for _ in 0..500 {
            if let Some(deployment) = manager.status(&id) {
                if deployment.status.is_terminal() {
                    return deployment;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("deployment never reached a terminal state");
    }

    #[tokio::test]
    async fn successful_pipeline_runs_all_steps_in_order() {
        let runner = Arc::new(ScriptedRunner::ok());
        let manager = Arc::new(DeployManager::new(runner.clone(), test_config()));

        let id = manager.trigger().expect("trigger");
        let deployment = wait_for_terminal(&manager, id).await;

        assert_eq!(deployment.status, DeployStatus::Success);
        assert_eq!(deployment.previous_version.as_deref(), Some("abc1234"));
        assert!(deployment.finished_at.is_some());

        let calls = runner.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "git rev-parse HEAD",
                "git pull",
                "cargo build --release",
                "systemctl restart poolside",
            ]
        );
    }

    #[tokio::test]
    async fn failed_step_triggers_rollback() {
        let runner = Arc::new(ScriptedRunner::failing_on("git pull"));
        let manager = Arc::new(DeployManager::new(runner.clone(), test_config()));

        let id = manager.trigger().expect("trigger");
        let deployment = wait_for_terminal(&manager, id).await;

        assert_eq!(deployment.status, DeployStatus::RolledBack);
        let calls = runner.calls.lock().unwrap().clone();
        assert!(calls.contains(&"git checkout abc1234".to_string()));
        assert!(deployment.log.iter().any(|l| l.contains("Rolled back")));
    }

    #[tokio::test]
    async fn failure_without_rollback_ends_failed() {
        let mut config = test_config();
        config.auto_rollback = false;
        let runner = Arc::new(ScriptedRunner::failing_on("cargo build"));
        let manager = Arc::new(DeployManager::new(runner, config));

        let id = manager.trigger().expect("trigger");
        let deployment = wait_for_terminal(&manager, id).await;

        assert_eq!(deployment.status, DeployStatus::Failed);
        assert!(deployment
            .log
            .iter()
            .any(|l| l.contains("Deployment failed")));
    }

    #[tokio::test]
    async fn failed_rollback_is_logged_not_thrown() {
        // cargo build fails during both deploy and rollback
        let runner = Arc::new(ScriptedRunner::failing_on("cargo build"));
        let manager = Arc::new(DeployManager::new(runner, test_config()));

        let id = manager.trigger().expect("trigger");
        let deployment = wait_for_terminal(&manager, id).await;

        assert_eq!(deployment.status, DeployStatus::Failed);
        assert!(deployment.log.iter().any(|l| l.contains("Rollback failed")));
    }

    #[tokio::test]
    async fn second_trigger_is_rejected_while_one_is_running() {
        let gate = Arc::new(Semaphore::new(0));
        let runner = Arc::new(BlockingRunner { gate: gate.clone() });
        let manager = Arc::new(DeployManager::new(runner, test_config()));

        let first = manager.trigger().expect("first trigger");

        let err = manager.trigger().expect_err("second trigger must be rejected");
        assert!(matches!(err, ServiceError::Conflict(_)));

        // Release the pipeline; once it finishes, a new trigger is allowed
        gate.add_permits(100);
        let finished = wait_for_terminal(&manager, first).await;
        assert_eq!(finished.status, DeployStatus::Success);

        manager.trigger().expect("trigger after completion");
    }
}
