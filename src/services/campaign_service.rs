//! Campaign Service - nurture-sequence state machine and the batch tick
//! that advances due campaigns by at most one step each.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Timelike, Utc};
use sea_orm::*;

use crate::models::campaign_history;
use crate::models::email_campaign::{self, Entity as EmailCampaign};
use crate::models::lead::{self, Entity as Lead};
use crate::services::mailer::Mailer;
use crate::services::ServiceError;

/// One template + delay-from-previous-step pairing within a campaign type.
pub struct CampaignStep {
    pub subject: &'static str,
    pub body: &'static str,
    pub delay_days: i64,
}

/// Fixed step tables per campaign type. These are deliberate text blocks,
/// not a templating engine; rendering only substitutes {{name}}.
pub fn steps_for(campaign_type: &str) -> Option<&'static [CampaignStep]> {
    match campaign_type {
        "new_lead_nurture" => Some(NEW_LEAD_NURTURE),
        "post_appointment" => Some(POST_APPOINTMENT),
        "seasonal_promo" => Some(SEASONAL_PROMO),
        _ => None,
    }
}

static NEW_LEAD_NURTURE: &[CampaignStep] = &[
    CampaignStep {
        subject: "Thanks for reaching out, {{name}}!",
        body: "Hi {{name}},\n\nThanks for your interest in a new pool. One of our \
               project specialists will be in touch shortly to talk through your \
               backyard and budget.\n\n- The Poolside Team",
        delay_days: 0,
    },
    CampaignStep {
        subject: "What to expect from your pool project",
        body: "Hi {{name}},\n\nHere is a quick overview of how a typical build goes: \
               design consultation, permitting, excavation, shell, decking, and \
               startup. Most projects finish in 8-12 weeks.\n\n- The Poolside Team",
        delay_days: 2,
    },
    CampaignStep {
        subject: "Gunite, fiberglass, or vinyl?",
        body: "Hi {{name}},\n\nChoosing the right shell material is the biggest \
               decision in any build. Reply to this email and we can walk you \
               through the tradeoffs for your yard.\n\n- The Poolside Team",
        delay_days: 3,
    },
    CampaignStep {
        subject: "Ready for a free site visit?",
        body: "Hi {{name}},\n\nWe still have a few site-visit slots open this month. \
               A 30-minute walkthrough gets you a firm quote with no obligation.\n\n\
               - The Poolside Team",
        delay_days: 4,
    },
    CampaignStep {
        subject: "Last check-in from Poolside",
        body: "Hi {{name}},\n\nWe will stop emailing after this one. If the timing \
               is not right, keep us in mind for next season - quotes are free all \
               year.\n\n- The Poolside Team",
        delay_days: 7,
    },
];

static POST_APPOINTMENT: &[CampaignStep] = &[
    CampaignStep {
        subject: "Great meeting you, {{name}}",
        body: "Hi {{name}},\n\nThanks for making time for the consultation. Your \
               written quote is being prepared and will arrive within two business \
               days.\n\n- The Poolside Team",
        delay_days: 0,
    },
    CampaignStep {
        subject: "Your quote, and what happens next",
        body: "Hi {{name}},\n\nAny questions about the quote we sent over? Happy to \
               adjust scope or phasing to fit your budget.\n\n- The Poolside Team",
        delay_days: 3,
    },
    CampaignStep {
        subject: "Holding your build slot",
        body: "Hi {{name}},\n\nOur schedule is filling for the season. A signed \
               agreement this week locks in your start date and current \
               pricing.\n\n- The Poolside Team",
        delay_days: 5,
    },
];

static SEASONAL_PROMO: &[CampaignStep] = &[
    CampaignStep {
        subject: "Off-season pricing is live",
        body: "Hi {{name}},\n\nBuilds contracted before spring get our off-season \
               rate - typically 8-10% under summer pricing.\n\n- The Poolside Team",
        delay_days: 0,
    },
    CampaignStep {
        subject: "Why winter is the best time to break ground",
        body: "Hi {{name}},\n\nPermits move faster, crews are available, and your \
               pool is ready the day the weather turns.\n\n- The Poolside Team",
        delay_days: 5,
    },
    CampaignStep {
        subject: "Off-season pricing ends soon",
        body: "Hi {{name}},\n\nLast call for off-season rates. Book a consultation \
               this week to qualify.\n\n- The Poolside Team",
        delay_days: 7,
    },
];

// Local send window: steps are never scheduled outside 09:00-18:00.
const SEND_WINDOW_START_HOUR: u32 = 9;
const SEND_WINDOW_END_HOUR: u32 = 18;

/// Standard-time UTC offsets for the timezones the intake forms offer.
/// DST is intentionally ignored; an hour of drift is acceptable for
/// marketing sends.
fn utc_offset_hours(timezone: &str) -> i32 {
    match timezone {
        "America/New_York" => -5,
        "America/Chicago" => -6,
        "America/Denver" | "America/Phoenix" => -7,
        "America/Los_Angeles" => -8,
        _ => 0,
    }
}

/// Next send time: now + delay, clamped into the local send window.
pub fn calculate_next_send_time(delay_days: i64, timezone: &str) -> DateTime<Utc> {
    next_send_from(Utc::now(), delay_days, timezone)
}

pub fn next_send_from(from: DateTime<Utc>, delay_days: i64, timezone: &str) -> DateTime<Utc> {
    let offset = FixedOffset::east_opt(utc_offset_hours(timezone) * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset"));

    let local = (from + Duration::days(delay_days)).with_timezone(&offset);

    let clamped = if local.hour() < SEND_WINDOW_START_HOUR {
        local
            .date_naive()
            .and_hms_opt(SEND_WINDOW_START_HOUR, 0, 0)
            .and_then(|dt| offset.from_local_datetime(&dt).single())
            .unwrap_or(local)
    } else if local.hour() >= SEND_WINDOW_END_HOUR {
        (local.date_naive() + Duration::days(1))
            .and_hms_opt(SEND_WINDOW_START_HOUR, 0, 0)
            .and_then(|dt| offset.from_local_datetime(&dt).single())
            .unwrap_or(local)
    } else {
        local
    };

    clamped.with_timezone(&Utc)
}

fn render(template: &str, lead: &lead::Model) -> String {
    template
        .replace("{{name}}", &lead.name)
        .replace("{{email}}", &lead.email)
}

/// Enroll a lead in a campaign. Refused while the lead already has a
/// non-completed campaign; an unsubscribed campaign blocks re-enrollment
/// permanently.
pub async fn enroll(
    db: &DatabaseConnection,
    lead_id: i32,
    campaign_type: &str,
    timezone: &str,
) -> Result<email_campaign::Model, ServiceError> {
    let steps = steps_for(campaign_type).ok_or_else(|| {
        ServiceError::InvalidState(format!("Unknown campaign type: {}", campaign_type))
    })?;

    Lead::find_by_id(lead_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let existing = EmailCampaign::find()
        .filter(email_campaign::Column::LeadId.eq(lead_id))
        .filter(email_campaign::Column::Status.ne("completed"))
        .one(db)
        .await?;

    if let Some(existing) = existing {
        return Err(ServiceError::Conflict(format!(
            "Lead already has a {} campaign",
            existing.status
        )));
    }

    let now = Utc::now().to_rfc3339();

    let campaign = email_campaign::ActiveModel {
        lead_id: Set(lead_id),
        campaign_type: Set(campaign_type.to_owned()),
        current_step: Set(0),
        total_steps: Set(steps.len() as i32),
        status: Set("active".to_owned()),
        // Step 0 is due on the next tick
        next_send_at: Set(Some(now.clone())),
        enrolled_at: Set(now.clone()),
        timezone: Set(timezone.to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(campaign.insert(db).await?)
}

pub async fn pause(
    db: &DatabaseConnection,
    id: i32,
) -> Result<email_campaign::Model, ServiceError> {
    let campaign = EmailCampaign::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if campaign.status != "active" {
        return Err(ServiceError::InvalidState(format!(
            "Cannot pause a {} campaign",
            campaign.status
        )));
    }

    let mut active: email_campaign::ActiveModel = campaign.into();
    active.status = Set("paused".to_owned());
    active.updated_at = Set(Utc::now().to_rfc3339());
    Ok(active.update(db).await?)
}

pub async fn resume(
    db: &DatabaseConnection,
    id: i32,
) -> Result<email_campaign::Model, ServiceError> {
    let campaign = EmailCampaign::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if campaign.status != "paused" {
        return Err(ServiceError::InvalidState(format!(
            "Cannot resume a {} campaign",
            campaign.status
        )));
    }

    let steps = steps_for(&campaign.campaign_type).ok_or_else(|| {
        ServiceError::InvalidState(format!("Unknown campaign type: {}", campaign.campaign_type))
    })?;

    let delay = steps
        .get(campaign.current_step as usize)
        .map(|s| s.delay_days)
        .unwrap_or(0);

    // Resuming always schedules strictly into the future, even for a
    // zero-delay step.
    let now = Utc::now();
    let mut next = calculate_next_send_time(delay, &campaign.timezone);
    if next <= now {
        next = now + Duration::minutes(1);
    }

    let mut active: email_campaign::ActiveModel = campaign.into();
    active.status = Set("active".to_owned());
    active.next_send_at = Set(Some(next.to_rfc3339()));
    active.updated_at = Set(now.to_rfc3339());
    Ok(active.update(db).await?)
}

/// Terminal: an unsubscribed campaign is never sent to again and blocks
/// re-enrollment of its lead.
pub async fn unsubscribe(
    db: &DatabaseConnection,
    id: i32,
) -> Result<email_campaign::Model, ServiceError> {
    let campaign = EmailCampaign::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if campaign.status == "unsubscribed" {
        return Ok(campaign);
    }

    let mut active: email_campaign::ActiveModel = campaign.into();
    active.status = Set("unsubscribed".to_owned());
    active.next_send_at = Set(None);
    active.updated_at = Set(Utc::now().to_rfc3339());
    Ok(active.update(db).await?)
}

#[derive(Debug, Default, PartialEq)]
pub struct TickSummary {
    pub due: usize,
    pub sent: usize,
    pub delivery_failures: usize,
    pub skipped: usize,
}

/// One scheduler tick: advance every due, active campaign by at most one
/// step. Per-campaign errors are logged and do not abort the batch.
pub async fn process_campaigns(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
) -> Result<TickSummary, ServiceError> {
    let now = Utc::now().to_rfc3339();

    let due = EmailCampaign::find()
        .filter(email_campaign::Column::Status.eq("active"))
        .filter(
            Condition::any()
                .add(email_campaign::Column::NextSendAt.is_null())
                .add(email_campaign::Column::NextSendAt.lte(now)),
        )
        .order_by_asc(email_campaign::Column::Id)
        .all(db)
        .await?;

    let mut summary = TickSummary {
        due: due.len(),
        ..Default::default()
    };

    for campaign in due {
        let campaign_id = campaign.id;
        match send_next_step(db, mailer, campaign).await {
            Ok(StepOutcome::Sent) => summary.sent += 1,
            Ok(StepOutcome::DeliveryFailed) => summary.delivery_failures += 1,
            Ok(StepOutcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                summary.skipped += 1;
                tracing::error!("Campaign {} failed this tick: {:?}", campaign_id, e);
            }
        }
    }

    Ok(summary)
}

enum StepOutcome {
    Sent,
    DeliveryFailed,
    Skipped,
}

async fn send_next_step(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    campaign: email_campaign::Model,
) -> Result<StepOutcome, ServiceError> {
    // Lead gone (deleted mid-sequence): skip, never fail the batch.
    let lead = match Lead::find_by_id(campaign.lead_id).one(db).await? {
        Some(lead) => lead,
        None => {
            tracing::warn!(
                "Campaign {} references missing lead {}, skipping",
                campaign.id,
                campaign.lead_id
            );
            return Ok(StepOutcome::Skipped);
        }
    };

    let steps = steps_for(&campaign.campaign_type).ok_or_else(|| {
        ServiceError::InvalidState(format!("Unknown campaign type: {}", campaign.campaign_type))
    })?;

    // A row at current_step == total_steps should already be completed;
    // repair the status instead of indexing out of bounds.
    let step = match steps.get(campaign.current_step as usize) {
        Some(step) => step,
        None => {
            let mut active: email_campaign::ActiveModel = campaign.into();
            active.status = Set("completed".to_owned());
            active.next_send_at = Set(None);
            active.updated_at = Set(Utc::now().to_rfc3339());
            active.update(db).await?;
            return Ok(StepOutcome::Skipped);
        }
    };

    let subject = render(step.subject, &lead);
    let body = render(step.body, &lead);

    let delivery = mailer.send(&lead.email, &subject, &body).await;
    let delivered = delivery.is_ok();

    // Outcome is recorded whether or not delivery succeeded.
    let history = campaign_history::ActiveModel {
        campaign_id: Set(campaign.id),
        lead_id: Set(lead.id),
        step_number: Set(campaign.current_step),
        subject: Set(subject),
        delivered: Set(delivered),
        error_message: Set(delivery.err()),
        sent_at: Set(Utc::now().to_rfc3339()),
        ..Default::default()
    };
    history.insert(db).await?;

    if !delivered {
        // Step stays due; the next tick retries it.
        return Ok(StepOutcome::DeliveryFailed);
    }

    let next_step = campaign.current_step + 1;
    let total_steps = campaign.total_steps;
    let timezone = campaign.timezone.clone();

    let mut active: email_campaign::ActiveModel = campaign.into();
    active.current_step = Set(next_step);
    if next_step >= total_steps {
        active.status = Set("completed".to_owned());
        active.next_send_at = Set(None);
    } else {
        let delay = steps
            .get(next_step as usize)
            .map(|s| s.delay_days)
            .unwrap_or(1);
        active.next_send_at = Set(Some(calculate_next_send_time(delay, &timezone).to_rfc3339()));
    }
    active.updated_at = Set(Utc::now().to_rfc3339());
    active.update(db).await?;

    Ok(StepOutcome::Sent)
}
