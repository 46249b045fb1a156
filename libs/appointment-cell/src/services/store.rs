// libs/appointment-cell/src/services/store.rs
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::codec::{instant_column, to_millis, uuid_column};
use shared_models::error::SchedulingError;

use crate::models::{Appointment, AppointmentStatus};
use crate::services::lifecycle::AppointmentLifecycleService;

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, doctor_id, slot_id, appointment_at, status, created_at";

/// Owner of appointment records.
///
/// Performs no referential validation; the booking coordinator checks
/// patients, doctors and slots before anything lands here.
#[derive(Clone)]
pub struct AppointmentStore {
    pool: SqlitePool,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let mut conn = self.pool.acquire().await?;
        self.fetch_appointment(&mut conn, appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Appointment"))
    }

    /// All appointments of a patient, most recent instant first.
    pub async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Listing appointments for patient: {}", patient_id);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE patient_id = ? ORDER BY appointment_at DESC",
            APPOINTMENT_COLUMNS
        ))
        .bind(patient_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(appointment_from_row).collect()
    }

    /// All appointments of a doctor, most recent instant first.
    pub async fn list_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Listing appointments for doctor: {}", doctor_id);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE doctor_id = ? ORDER BY appointment_at DESC",
            APPOINTMENT_COLUMNS
        ))
        .bind(doctor_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(appointment_from_row).collect()
    }

    /// Scheduled appointments strictly after `now`, soonest first.
    pub async fn list_upcoming_by_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM appointments
             WHERE patient_id = ? AND status = 'scheduled' AND appointment_at > ?
             ORDER BY appointment_at ASC",
            APPOINTMENT_COLUMNS
        ))
        .bind(patient_id.to_string())
        .bind(to_millis(now))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(appointment_from_row).collect()
    }

    /// Appointments already in the past or already closed, most recent first.
    pub async fn list_past_by_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM appointments
             WHERE patient_id = ? AND (appointment_at <= ? OR status IN ('completed', 'cancelled'))
             ORDER BY appointment_at DESC",
            APPOINTMENT_COLUMNS
        ))
        .bind(patient_id.to_string())
        .bind(to_millis(now))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(appointment_from_row).collect()
    }

    /// The scheduled appointment bound to a slot, if any.
    pub async fn get_by_slot(&self, slot_id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let mut conn = self.pool.acquire().await?;
        self.find_scheduled_by_slot_in(&mut conn, slot_id).await
    }

    /// Status-only write for this record; the slot is left untouched.
    /// Cancellations that must free the slot go through `BookingCoordinator`.
    ///
    /// The read only feeds the state machine check. The write is a single
    /// statement conditional on the status that was read.
    pub async fn set_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Uuid, SchedulingError> {
        let current = self.get_appointment(appointment_id).await?;

        let mut conn = self.pool.acquire().await?;
        self.set_status_in(&mut conn, &current, new_status).await?;
        Ok(appointment_id)
    }

    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let mut conn = self.pool.acquire().await?;
        self.delete_appointment_in(&mut conn, appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Appointment"))
    }

    // --------------------------------------------------------------------------
    // Transaction-scoped primitives
    // --------------------------------------------------------------------------

    /// Insert a `scheduled` appointment. The caller must already hold the slot.
    pub async fn create_appointment(
        &self,
        conn: &mut SqliteConnection,
        patient_id: Uuid,
        doctor_id: Uuid,
        slot_id: Uuid,
        appointment_time: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            slot_id,
            appointment_time,
            status: AppointmentStatus::Scheduled,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO appointments (id, patient_id, doctor_id, slot_id, appointment_at, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(appointment.id.to_string())
        .bind(patient_id.to_string())
        .bind(doctor_id.to_string())
        .bind(slot_id.to_string())
        .bind(to_millis(appointment_time))
        .bind(appointment.status.as_str())
        .bind(to_millis(appointment.created_at))
        .execute(&mut *conn)
        .await?;

        info!("Appointment {} created on slot {}", appointment.id, slot_id);
        Ok(appointment)
    }

    pub async fn fetch_appointment(
        &self,
        conn: &mut SqliteConnection,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE id = ?",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(appointment_from_row).transpose()
    }

    pub async fn find_scheduled_by_slot_in(
        &self,
        conn: &mut SqliteConnection,
        slot_id: Uuid,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE slot_id = ? AND status = 'scheduled'",
            APPOINTMENT_COLUMNS
        ))
        .bind(slot_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(appointment_from_row).transpose()
    }

    /// Move `current` to `new_status` if the state machine allows it.
    ///
    /// The write is conditional on the stored status still matching
    /// `current.status`; a concurrent change surfaces as InvalidTransition.
    pub async fn set_status_in(
        &self,
        conn: &mut SqliteConnection,
        current: &Appointment,
        new_status: AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        self.lifecycle
            .validate_status_transition(&current.status, &new_status)?;

        let result = sqlx::query("UPDATE appointments SET status = ? WHERE id = ? AND status = ?")
            .bind(new_status.as_str())
            .bind(current.id.to_string())
            .bind(current.status.as_str())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulingError::InvalidTransition {
                from: current.status.to_string(),
                to: new_status.to_string(),
            });
        }

        info!("Appointment {} moved from {} to {}", current.id, current.status, new_status);
        Ok(())
    }

    pub async fn delete_appointment_in(
        &self,
        conn: &mut SqliteConnection,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let row = sqlx::query(&format!(
            "DELETE FROM appointments WHERE id = ? RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        let deleted = row.as_ref().map(appointment_from_row).transpose()?;
        if deleted.is_some() {
            info!("Appointment {} deleted", appointment_id);
        }
        Ok(deleted)
    }
}

fn appointment_from_row(row: &SqliteRow) -> Result<Appointment, SchedulingError> {
    let status: String = row.try_get("status")?;

    Ok(Appointment {
        id: uuid_column(row, "id")?,
        patient_id: uuid_column(row, "patient_id")?,
        doctor_id: uuid_column(row, "doctor_id")?,
        slot_id: uuid_column(row, "slot_id")?,
        appointment_time: instant_column(row, "appointment_at")?,
        status: status.parse().map_err(SchedulingError::Unexpected)?,
        created_at: instant_column(row, "created_at")?,
    })
}
