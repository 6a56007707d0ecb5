//! Declarative automations. The admin surface registers a trigger plus one
//! typed action; actions are interpreted by a match, never constructed from
//! request-supplied code.

use sea_orm::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::automation::{self, Entity as Automation};
use crate::models::email_campaign::{self, Entity as EmailCampaign};
use crate::models::lead::{self, Entity as Lead};
use crate::services::mailer::Mailer;
use crate::services::{lead_service, ServiceError};

/// The full action vocabulary. Adding a capability means adding a variant
/// here, not accepting code from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    ForwardWebhook {
        url: String,
    },
    SendTemplatedEmail {
        /// Defaults to the triggering lead's address
        to: Option<String>,
        subject: String,
        body: String,
    },
    RunQueryTemplate {
        template: QueryTemplate,
    },
}

/// Named, parameter-free queries. No free-form SQL crosses this boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryTemplate {
    LeadCountsByStatus,
    CampaignSummary,
}

fn render(template: &str, lead: Option<&lead::Model>) -> String {
    match lead {
        Some(lead) => template
            .replace("{{name}}", &lead.name)
            .replace("{{email}}", &lead.email),
        None => template.to_string(),
    }
}

/// Execute one action. `lead` is the triggering lead for lead-triggered
/// runs, or None for manual runs from the admin dashboard.
pub async fn run_action(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    http: &reqwest::Client,
    action: &Action,
    lead: Option<&lead::Model>,
) -> Result<Value, ServiceError> {
    match action {
        Action::ForwardWebhook { url } => {
            let payload = match lead {
                Some(lead) => serde_json::to_value(lead)
                    .map_err(|e| ServiceError::InvalidState(e.to_string()))?,
                None => json!({}),
            };
            let response = http
                .post(url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| ServiceError::InvalidState(format!("Webhook failed: {}", e)))?;
            Ok(json!({ "webhook_status": response.status().as_u16() }))
        }
        Action::SendTemplatedEmail { to, subject, body } => {
            let recipient = to
                .clone()
                .or_else(|| lead.map(|l| l.email.clone()))
                .ok_or_else(|| {
                    ServiceError::InvalidState("No recipient for templated email".to_string())
                })?;
            mailer
                .send(&recipient, &render(subject, lead), &render(body, lead))
                .await
                .map_err(ServiceError::InvalidState)?;
            Ok(json!({ "sent_to": recipient }))
        }
        Action::RunQueryTemplate { template } => run_query_template(db, *template).await,
    }
}

async fn run_query_template(
    db: &DatabaseConnection,
    template: QueryTemplate,
) -> Result<Value, ServiceError> {
    match template {
        QueryTemplate::LeadCountsByStatus => {
            let mut counts = serde_json::Map::new();
            for status in lead_service::LEAD_STATUSES {
                let count = Lead::find()
                    .filter(lead::Column::Status.eq(*status))
                    .count(db)
                    .await?;
                counts.insert(status.to_string(), json!(count));
            }
            Ok(Value::Object(counts))
        }
        QueryTemplate::CampaignSummary => {
            let active = EmailCampaign::find()
                .filter(email_campaign::Column::Status.eq("active"))
                .count(db)
                .await?;
            let completed = EmailCampaign::find()
                .filter(email_campaign::Column::Status.eq("completed"))
                .count(db)
                .await?;
            let unsubscribed = EmailCampaign::find()
                .filter(email_campaign::Column::Status.eq("unsubscribed"))
                .count(db)
                .await?;
            Ok(json!({
                "active": active,
                "completed": completed,
                "unsubscribed": unsubscribed,
            }))
        }
    }
}

/// Fire every enabled lead_created automation. Failures are logged; lead
/// intake never fails because an automation did.
pub async fn run_lead_created(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    http: &reqwest::Client,
    lead: &lead::Model,
) {
    let automations = match Automation::find()
        .filter(automation::Column::Trigger.eq("lead_created"))
        .filter(automation::Column::Enabled.eq(true))
        .all(db)
        .await
    {
        Ok(automations) => automations,
        Err(e) => {
            tracing::error!("Failed to load automations: {}", e);
            return;
        }
    };

    for row in automations {
        let action: Action = match serde_json::from_str(&row.action) {
            Ok(action) => action,
            Err(e) => {
                tracing::error!("Automation {} has an invalid action: {}", row.id, e);
                continue;
            }
        };

        match run_action(db, mailer, http, &action, Some(lead)).await {
            Ok(result) => {
                tracing::info!("Automation {} ({}) ran: {}", row.id, row.name, result)
            }
            Err(e) => tracing::warn!("Automation {} ({}) failed: {:?}", row.id, row.name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::services::mailer::Mailer;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct RecordingMailer(Mutex<Vec<(String, String, String)>>);

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), String> {
            self.0
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn sample_lead() -> lead::Model {
        lead::Model {
            id: 1,
            name: "Dana Smith".to_string(),
            email: "dana@example.com".to_string(),
            phone: None,
            source: "form".to_string(),
            project_type: None,
            budget: None,
            message: None,
            status: "new".to_string(),
            affiliate_code: None,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn actions_round_trip_through_json() {
        let action: Action = serde_json::from_str(
            r#"{"type":"send_templated_email","subject":"Hi {{name}}","body":"..."} "#,
        )
        .expect("parse");
        assert!(matches!(action, Action::SendTemplatedEmail { .. }));

        let action: Action =
            serde_json::from_str(r#"{"type":"run_query_template","template":"lead_counts_by_status"}"#)
                .expect("parse");
        assert!(matches!(action, Action::RunQueryTemplate { .. }));

        // Unknown action types are rejected at parse time
        assert!(serde_json::from_str::<Action>(r#"{"type":"eval","code":"x"}"#).is_err());
    }

    #[tokio::test]
    async fn templated_email_substitutes_lead_fields() {
        let db = init_db("sqlite::memory:").await.expect("init db");
        let mailer = RecordingMailer(Mutex::new(Vec::new()));
        let http = reqwest::Client::new();

        let action = Action::SendTemplatedEmail {
            to: None,
            subject: "Welcome {{name}}".to_string(),
            body: "Reaching you at {{email}}".to_string(),
        };

        run_action(&db, &mailer, &http, &action, Some(&sample_lead()))
            .await
            .expect("run");

        let sent = mailer.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "dana@example.com");
        assert_eq!(sent[0].1, "Welcome Dana Smith");
        assert_eq!(sent[0].2, "Reaching you at dana@example.com");
    }

    #[tokio::test]
    async fn templated_email_without_recipient_is_rejected() {
        let db = init_db("sqlite::memory:").await.expect("init db");
        let mailer = RecordingMailer(Mutex::new(Vec::new()));
        let http = reqwest::Client::new();

        let action = Action::SendTemplatedEmail {
            to: None,
            subject: "s".to_string(),
            body: "b".to_string(),
        };

        assert!(matches!(
            run_action(&db, &mailer, &http, &action, None).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn query_template_counts_leads() {
        let db = init_db("sqlite::memory:").await.expect("init db");
        let mailer = RecordingMailer(Mutex::new(Vec::new()));
        let http = reqwest::Client::new();

        let now = Utc::now().to_rfc3339();
        lead::ActiveModel {
            name: Set("A".to_owned()),
            email: Set("a@example.com".to_owned()),
            source: Set("form".to_owned()),
            status: Set("new".to_owned()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let action = Action::RunQueryTemplate {
            template: QueryTemplate::LeadCountsByStatus,
        };
        let result = run_action(&db, &mailer, &http, &action, None)
            .await
            .expect("run");
        assert_eq!(result["new"], 1);
        assert_eq!(result["won"], 0);
    }
}
