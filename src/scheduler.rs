//! Campaign processor lifecycle. One loop task owns the tick; because the
//! tick runs inline in that task, two ticks can never overlap — a slow
//! batch simply delays the next one.

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::campaign_service;
use crate::services::mailer::Mailer;

pub struct CampaignProcessor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CampaignProcessor {
    pub fn start(db: DatabaseConnection, mailer: Arc<dyn Mailer>, interval: Duration) -> Self {
        let (shutdown, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            tracing::info!(
                "Campaign processor started ({}s interval)",
                interval.as_secs()
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match campaign_service::process_campaigns(&db, mailer.as_ref()).await {
                            Ok(summary) if summary.due > 0 => tracing::info!(
                                "Campaign tick: {} due, {} sent, {} delivery failures, {} skipped",
                                summary.due,
                                summary.sent,
                                summary.delivery_failures,
                                summary.skipped
                            ),
                            Ok(_) => {}
                            Err(e) => tracing::error!("Campaign tick failed: {:?}", e),
                        }
                    }
                    _ = stopped.changed() => {
                        tracing::info!("Campaign processor stopping");
                        break;
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Stop scheduling new ticks. Work in flight from the current tick is
    /// not cancelled.
    pub fn stop(self) {
        let _ = self.shutdown.send(true);
        drop(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::services::mailer::LogMailer;

    #[tokio::test]
    async fn processor_starts_and_stops_cleanly() {
        let db = init_db("sqlite::memory:").await.expect("init db");
        let processor =
            CampaignProcessor::start(db, Arc::new(LogMailer), Duration::from_millis(10));

        // Let at least one tick run against the empty database
        tokio::time::sleep(Duration::from_millis(50)).await;
        processor.stop();
    }
}
