use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Create leads table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT,
            source TEXT NOT NULL DEFAULT 'form',
            project_type TEXT,
            budget REAL,
            message TEXT,
            status TEXT NOT NULL DEFAULT 'new',
            affiliate_code TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status);
        CREATE INDEX IF NOT EXISTS idx_leads_email ON leads(email);
        "#
        .to_owned(),
    ))
    .await?;

    // Create appointments table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS appointments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lead_id INTEGER NOT NULL,
            scheduled_at TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'consultation',
            status TEXT NOT NULL DEFAULT 'scheduled',
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (lead_id) REFERENCES leads(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_appointments_lead_id ON appointments(lead_id);
        CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status);
        "#
        .to_owned(),
    ))
    .await?;

    // Create affiliates table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS affiliates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            commission_rate REAL NOT NULL DEFAULT 0.05,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_affiliates_code ON affiliates(code);
        "#
        .to_owned(),
    ))
    .await?;

    // Create referrals table (commission ledger)
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS referrals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            affiliate_id INTEGER NOT NULL,
            lead_id INTEGER,
            target_url TEXT,
            converted INTEGER NOT NULL DEFAULT 0,
            commission_amount REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (affiliate_id) REFERENCES affiliates(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_referrals_affiliate_id ON referrals(affiliate_id);
        "#
        .to_owned(),
    ))
    .await?;

    // Create email_campaigns table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS email_campaigns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lead_id INTEGER NOT NULL,
            campaign_type TEXT NOT NULL,
            current_step INTEGER NOT NULL DEFAULT 0,
            total_steps INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            next_send_at TEXT,
            enrolled_at TEXT NOT NULL,
            timezone TEXT NOT NULL DEFAULT 'UTC',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_email_campaigns_lead_id ON email_campaigns(lead_id);
        CREATE INDEX IF NOT EXISTS idx_email_campaigns_status ON email_campaigns(status);
        "#
        .to_owned(),
    ))
    .await?;

    // Create campaign_history table (append-only send log)
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS campaign_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id INTEGER NOT NULL,
            lead_id INTEGER NOT NULL,
            step_number INTEGER NOT NULL,
            subject TEXT NOT NULL,
            delivered INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            sent_at TEXT NOT NULL,
            opened_at TEXT,
            clicked_at TEXT,
            clicked_url TEXT,
            FOREIGN KEY (campaign_id) REFERENCES email_campaigns(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_campaign_history_campaign_id ON campaign_history(campaign_id);
        "#
        .to_owned(),
    ))
    .await?;

    // Create automations table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS automations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            "trigger" TEXT NOT NULL DEFAULT 'lead_created',
            action TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
        .to_owned(),
    ))
    .await?;

    // Migration: add budget column for databases created before quoting went in.
    // SQLite has no IF NOT EXISTS for ALTER TABLE, so errors are ignored.
    let _ = db
        .execute(Statement::from_string(
            db.get_database_backend(),
            "ALTER TABLE leads ADD COLUMN budget REAL".to_owned(),
        ))
        .await;

    // Migration: per-campaign timezone (older rows scheduled in UTC)
    let _ = db
        .execute(Statement::from_string(
            db.get_database_backend(),
            "ALTER TABLE email_campaigns ADD COLUMN timezone TEXT NOT NULL DEFAULT 'UTC'"
                .to_owned(),
        ))
        .await;

    Ok(())
}
