// libs/appointment-cell/src/services/notification.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::codec::{from_millis, instant_column, to_millis, uuid_column};
use shared_models::error::SchedulingError;

use crate::models::{AppointmentEvent, AppointmentStatus, Notification};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification store failure: {0}")]
    Store(#[from] SchedulingError),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Notification endpoint answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<sqlx::Error> for NotifyError {
    fn from(err: sqlx::Error) -> Self {
        NotifyError::Store(SchedulingError::from(err))
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Delivery(err.to_string())
    }
}

/// Receiver of committed appointment events.
///
/// Called after the transaction commits. An error is reported back to the
/// caller but never undoes the state change.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_appointment_created(
        &self,
        patient_owner_id: &str,
        doctor_name: &str,
        appointment_time: DateTime<Utc>,
    ) -> Result<(), NotifyError>;

    async fn on_appointment_status_changed(
        &self,
        patient_owner_id: &str,
        doctor_name: &str,
        new_status: AppointmentStatus,
    ) -> Result<(), NotifyError>;
}

// ==============================================================================
// STORE-BACKED INBOX
// ==============================================================================

/// Writes one inbox row per event into the `notifications` table.
#[derive(Clone)]
pub struct StoreNotifier {
    pool: SqlitePool,
}

impl StoreNotifier {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn record(&self, event: &AppointmentEvent) -> Result<(), NotifyError> {
        let (appointment_at, status) = match event {
            AppointmentEvent::AppointmentCreated { appointment_time, .. } => {
                (Some(to_millis(*appointment_time)), None)
            }
            AppointmentEvent::AppointmentStatusChanged { new_status, .. } => {
                (None, Some(new_status.as_str()))
            }
        };
        let doctor_name = match event {
            AppointmentEvent::AppointmentCreated { doctor_name, .. }
            | AppointmentEvent::AppointmentStatusChanged { doctor_name, .. } => doctor_name,
        };

        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, doctor_name, appointment_at, status, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(event.recipient())
        .bind(event.kind().as_str())
        .bind(doctor_name)
        .bind(appointment_at)
        .bind(status)
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await?;

        debug!("Stored {} notification for {}", event.kind().as_str(), event.recipient());
        Ok(())
    }
}

#[async_trait]
impl Notifier for StoreNotifier {
    async fn on_appointment_created(
        &self,
        patient_owner_id: &str,
        doctor_name: &str,
        appointment_time: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        self.record(&AppointmentEvent::AppointmentCreated {
            patient_owner_id: patient_owner_id.to_string(),
            doctor_name: doctor_name.to_string(),
            appointment_time,
        })
        .await
    }

    async fn on_appointment_status_changed(
        &self,
        patient_owner_id: &str,
        doctor_name: &str,
        new_status: AppointmentStatus,
    ) -> Result<(), NotifyError> {
        self.record(&AppointmentEvent::AppointmentStatusChanged {
            patient_owner_id: patient_owner_id.to_string(),
            doctor_name: doctor_name.to_string(),
            new_status,
        })
        .await
    }
}

// ==============================================================================
// WEBHOOK DELIVERY
// ==============================================================================

/// POSTs each event as JSON to a configured endpoint.
#[derive(Clone)]
pub struct WebhookNotifier {
    http_client: Client,
    endpoint: String,
    request_timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            endpoint: endpoint.into(),
            request_timeout,
        }
    }

    async fn deliver(&self, event: &AppointmentEvent) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .timeout(self.request_timeout)
            .header(header::CONTENT_TYPE, "application/json")
            .json(event)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        debug!("Delivered {} webhook for {}", event.kind().as_str(), event.recipient());
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn on_appointment_created(
        &self,
        patient_owner_id: &str,
        doctor_name: &str,
        appointment_time: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        self.deliver(&AppointmentEvent::AppointmentCreated {
            patient_owner_id: patient_owner_id.to_string(),
            doctor_name: doctor_name.to_string(),
            appointment_time,
        })
        .await
    }

    async fn on_appointment_status_changed(
        &self,
        patient_owner_id: &str,
        doctor_name: &str,
        new_status: AppointmentStatus,
    ) -> Result<(), NotifyError> {
        self.deliver(&AppointmentEvent::AppointmentStatusChanged {
            patient_owner_id: patient_owner_id.to_string(),
            doctor_name: doctor_name.to_string(),
            new_status,
        })
        .await
    }
}

// ==============================================================================
// INBOX READS
// ==============================================================================

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, doctor_name, appointment_at, status, is_read, created_at";

#[derive(Clone)]
pub struct NotificationInbox {
    pool: SqlitePool,
}

impl NotificationInbox {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Notifications addressed to one identity, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>, SchedulingError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    pub async fn get(&self, notification_id: Uuid) -> Result<Notification, SchedulingError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = ?",
            NOTIFICATION_COLUMNS
        ))
        .bind(notification_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(notification_from_row)
            .transpose()?
            .ok_or_else(|| SchedulingError::not_found("Notification"))
    }

    pub async fn mark_read(&self, notification_id: Uuid) -> Result<(), SchedulingError> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(notification_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulingError::not_found("Notification"));
        }

        info!("Notification {} marked as read", notification_id);
        Ok(())
    }
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, SchedulingError> {
    let kind: String = row.try_get("kind")?;
    let appointment_at: Option<i64> = row.try_get("appointment_at")?;
    let status: Option<String> = row.try_get("status")?;

    Ok(Notification {
        id: uuid_column(row, "id")?,
        user_id: row.try_get("user_id")?,
        kind: kind.parse().map_err(SchedulingError::Unexpected)?,
        doctor_name: row.try_get("doctor_name")?,
        appointment_time: appointment_at.map(from_millis).transpose()?,
        status: status
            .map(|s| s.parse::<AppointmentStatus>())
            .transpose()
            .map_err(SchedulingError::Unexpected)?,
        is_read: row.try_get("is_read")?,
        created_at: instant_column(row, "created_at")?,
    })
}
