//! Lead Service - intake pipeline and dashboard stats, free of the HTTP layer.

use chrono::Utc;
use sea_orm::*;
use serde_json::{json, Value};

use crate::models::affiliate::{self, Entity as Affiliate};
use crate::models::appointment::{self, Entity as Appointment};
use crate::models::email_campaign::{self, Entity as EmailCampaign};
use crate::models::lead::{self, Entity as Lead, LeadDto};
use crate::models::referral;
use crate::services::mailer::Mailer;
use crate::services::{automation_service, campaign_service, ServiceError};

const LEAD_SOURCES: &[&str] = &["form", "chat", "voice", "email", "referral"];
pub const LEAD_STATUSES: &[&str] = &["new", "contacted", "quoted", "won", "lost"];

/// Schema validation for lead capture. Returns (field, message) pairs.
pub fn validate(dto: &LeadDto) -> Vec<(&'static str, String)> {
    let mut errors = Vec::new();

    if dto.name.trim().is_empty() {
        errors.push(("name", "Name is required".to_string()));
    }
    let email = dto.email.trim();
    if email.is_empty() {
        errors.push(("email", "Email is required".to_string()));
    } else if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        errors.push(("email", "Email is not valid".to_string()));
    }
    if !LEAD_SOURCES.contains(&dto.source.as_str()) {
        errors.push(("source", format!("Unknown source: {}", dto.source)));
    }
    if let Some(budget) = dto.budget {
        if budget < 0.0 {
            errors.push(("budget", "Budget cannot be negative".to_string()));
        }
    }

    errors
}

/// Create a lead and fan out the side effects: campaign auto-enrollment,
/// affiliate referral credit, sales-inbox notification, and automations.
/// Only the insert itself can fail the call; every fanout failure is
/// logged and swallowed.
pub async fn create_lead(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    http: &reqwest::Client,
    notify_email: Option<&str>,
    dto: LeadDto,
    timezone: &str,
) -> Result<lead::Model, ServiceError> {
    let now = Utc::now().to_rfc3339();

    let new_lead = lead::ActiveModel {
        name: Set(dto.name),
        email: Set(dto.email),
        phone: Set(dto.phone),
        source: Set(dto.source),
        project_type: Set(dto.project_type),
        budget: Set(dto.budget),
        message: Set(dto.message),
        status: Set("new".to_owned()),
        affiliate_code: Set(dto.affiliate_code),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let saved = new_lead.insert(db).await?;

    if let Some(code) = saved.affiliate_code.as_deref() {
        if let Err(e) = credit_referral(db, code, &saved).await {
            tracing::warn!("Referral credit failed for lead {}: {:?}", saved.id, e);
        }
    }

    match campaign_service::enroll(db, saved.id, "new_lead_nurture", timezone).await {
        Ok(campaign) => tracing::info!(
            "Lead {} auto-enrolled in campaign {} ({})",
            saved.id,
            campaign.id,
            campaign.campaign_type
        ),
        Err(e) => tracing::warn!("Auto-enrollment failed for lead {}: {:?}", saved.id, e),
    }

    if let Some(notify) = notify_email {
        let subject = format!("New lead: {} ({})", saved.name, saved.source);
        let body = format!(
            "Name: {}\nEmail: {}\nPhone: {}\nProject: {}\nBudget: {}\nMessage: {}\n",
            saved.name,
            saved.email,
            saved.phone.as_deref().unwrap_or("-"),
            saved.project_type.as_deref().unwrap_or("-"),
            saved
                .budget
                .map(|b| format!("${:.0}", b))
                .unwrap_or_else(|| "-".to_string()),
            saved.message.as_deref().unwrap_or("-"),
        );
        if let Err(e) = mailer.send(notify, &subject, &body).await {
            tracing::warn!("Lead notification failed: {}", e);
        }
    }

    automation_service::run_lead_created(db, mailer, http, &saved).await;

    Ok(saved)
}

/// Record a conversion on the affiliate's ledger. Commission is the
/// affiliate's rate applied to the stated project budget.
async fn credit_referral(
    db: &DatabaseConnection,
    code: &str,
    lead: &lead::Model,
) -> Result<(), ServiceError> {
    let affiliate = Affiliate::find()
        .filter(affiliate::Column::Code.eq(code))
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let commission = affiliate.commission_rate * lead.budget.unwrap_or(0.0);

    referral::ActiveModel {
        affiliate_id: Set(affiliate.id),
        lead_id: Set(Some(lead.id)),
        converted: Set(true),
        commission_amount: Set(commission),
        created_at: Set(Utc::now().to_rfc3339()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(())
}

pub async fn update_status(
    db: &DatabaseConnection,
    id: i32,
    status: &str,
) -> Result<lead::Model, ServiceError> {
    if !LEAD_STATUSES.contains(&status) {
        return Err(ServiceError::InvalidState(format!(
            "Unknown lead status: {}",
            status
        )));
    }

    let lead = Lead::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let mut active: lead::ActiveModel = lead.into();
    active.status = Set(status.to_owned());
    active.updated_at = Set(Utc::now().to_rfc3339());
    Ok(active.update(db).await?)
}

/// Dashboard counters for the CRM overview.
pub async fn stats(db: &DatabaseConnection) -> Result<Value, ServiceError> {
    let mut leads_by_status = serde_json::Map::new();
    for status in LEAD_STATUSES {
        let count = Lead::find()
            .filter(lead::Column::Status.eq(*status))
            .count(db)
            .await?;
        leads_by_status.insert(status.to_string(), json!(count));
    }

    let mut campaigns_by_status = serde_json::Map::new();
    for status in ["active", "paused", "completed", "unsubscribed"] {
        let count = EmailCampaign::find()
            .filter(email_campaign::Column::Status.eq(status))
            .count(db)
            .await?;
        campaigns_by_status.insert(status.to_string(), json!(count));
    }

    let total_leads = Lead::find().count(db).await?;
    let scheduled_appointments = Appointment::find()
        .filter(appointment::Column::Status.eq("scheduled"))
        .count(db)
        .await?;
    let affiliates = Affiliate::find().count(db).await?;

    let referrals = referral::Entity::find().all(db).await?;
    let total_commission: f64 = referrals
        .iter()
        .filter(|r| r.converted)
        .map(|r| r.commission_amount)
        .sum();

    Ok(json!({
        "leads": { "total": total_leads, "by_status": leads_by_status },
        "campaigns": { "by_status": campaigns_by_status },
        "appointments": { "scheduled": scheduled_appointments },
        "affiliates": { "total": affiliates, "total_commission": total_commission },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::services::mailer::LogMailer;

    fn capture_dto(email: &str) -> LeadDto {
        LeadDto {
            id: None,
            name: "Pat Rivera".to_string(),
            email: email.to_string(),
            phone: None,
            source: "form".to_string(),
            project_type: Some("gunite".to_string()),
            budget: Some(80_000.0),
            message: None,
            status: "new".to_string(),
            affiliate_code: None,
            created_at: None,
        }
    }

    #[test]
    fn validate_flags_missing_fields() {
        let mut dto = capture_dto("pat@example.com");
        dto.name = "  ".to_string();
        dto.email = "not-an-email".to_string();

        let errors = validate(&dto);
        let fields: Vec<&str> = errors.iter().map(|(f, _)| *f).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"email"));
    }

    #[test]
    fn validate_accepts_well_formed_lead() {
        assert!(validate(&capture_dto("pat@example.com")).is_empty());
    }

    #[tokio::test]
    async fn create_lead_auto_enrolls_campaign() {
        let db = init_db("sqlite::memory:").await.expect("init db");
        let http = reqwest::Client::new();

        let lead = create_lead(
            &db,
            &LogMailer,
            &http,
            None,
            capture_dto("pat@example.com"),
            "UTC",
        )
        .await
        .expect("create lead");

        let campaign = EmailCampaign::find()
            .filter(email_campaign::Column::LeadId.eq(lead.id))
            .one(&db)
            .await
            .unwrap()
            .expect("campaign auto-created");
        assert_eq!(campaign.status, "active");
        assert_eq!(campaign.current_step, 0);
    }

    #[tokio::test]
    async fn create_lead_credits_affiliate_commission() {
        let db = init_db("sqlite::memory:").await.expect("init db");
        let http = reqwest::Client::new();
        let now = Utc::now().to_rfc3339();

        affiliate::ActiveModel {
            name: Set("Backyard Blog".to_owned()),
            email: Set("partners@example.com".to_owned()),
            code: Set("BACKYARD10".to_owned()),
            commission_rate: Set(0.05),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let mut dto = capture_dto("pat@example.com");
        dto.affiliate_code = Some("BACKYARD10".to_string());

        let lead = create_lead(&db, &LogMailer, &http, None, dto, "UTC")
            .await
            .expect("create lead");

        let rows = referral::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].converted);
        assert_eq!(rows[0].lead_id, Some(lead.id));
        assert!((rows[0].commission_amount - 4_000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn update_status_rejects_unknown_status() {
        let db = init_db("sqlite::memory:").await.expect("init db");
        let http = reqwest::Client::new();
        let lead = create_lead(
            &db,
            &LogMailer,
            &http,
            None,
            capture_dto("pat@example.com"),
            "UTC",
        )
        .await
        .expect("create lead");

        assert!(matches!(
            update_status(&db, lead.id, "bogus").await,
            Err(ServiceError::InvalidState(_))
        ));

        let updated = update_status(&db, lead.id, "quoted").await.expect("update");
        assert_eq!(updated.status, "quoted");
    }
}
