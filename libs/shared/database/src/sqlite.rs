use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use shared_config::AppConfig;

/// Table and index definitions, applied in order by [`init_schema`].
///
/// Instants are UTC epoch milliseconds. Identifiers are UUID text.
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS patients (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS doctors (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        specialization TEXT NOT NULL,
        license_number TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS availability_slots (
        id TEXT PRIMARY KEY,
        doctor_id TEXT NOT NULL REFERENCES doctors(id),
        start_at INTEGER NOT NULL,
        end_at INTEGER NOT NULL,
        is_available INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL,
        CHECK (start_at < end_at)
    )",
    "CREATE INDEX IF NOT EXISTS idx_slots_doctor_start ON availability_slots(doctor_id, start_at)",
    // slot_id carries no foreign key: completed and cancelled appointments
    // keep their slot id after the slot row is deleted.
    "CREATE TABLE IF NOT EXISTS appointments (
        id TEXT PRIMARY KEY,
        patient_id TEXT NOT NULL REFERENCES patients(id),
        doctor_id TEXT NOT NULL REFERENCES doctors(id),
        slot_id TEXT NOT NULL,
        appointment_at INTEGER NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('scheduled', 'completed', 'cancelled')),
        created_at INTEGER NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_scheduled_slot
        ON appointments(slot_id) WHERE status = 'scheduled'",
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id, appointment_at)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_doctor ON appointments(doctor_id, appointment_at)",
    "CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        doctor_name TEXT NOT NULL,
        appointment_at INTEGER,
        status TEXT,
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at)",
];

/// Open the connection pool described by the configuration and bootstrap the schema.
pub async fn connect(config: &AppConfig) -> Result<SqlitePool> {
    debug!("Connecting to {}", config.database_url);

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("invalid DATABASE_URL: {}", config.database_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database_max_connections.max(1))
        .connect_with(options)
        .await
        .context("failed to open database pool")?;

    init_schema(&pool).await?;

    info!("Database ready ({} max connections)", config.database_max_connections.max(1));
    Ok(pool)
}

/// Create every table and index that does not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to apply schema")?;
    }
    Ok(())
}
