use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::codec::{instant_column, to_millis, to_stored_precision, uuid_column};
use shared_models::error::SchedulingError;

use crate::models::{AvailabilitySlot, SlotWithDoctor, Specialization};

const SLOT_COLUMNS: &str = "id, doctor_id, start_at, end_at, is_available, created_at";

/// Owner of availability slot records and of every write to `is_available`.
///
/// Methods taking a `SqliteConnection` run inside the caller's transaction;
/// the rest acquire their own connection from the pool.
#[derive(Clone)]
pub struct SlotStore {
    pool: SqlitePool,
}

impl SlotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an available slot, rejecting malformed intervals and any overlap
    /// with an existing slot of the same doctor (available or not).
    pub async fn create_slot(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Uuid, SchedulingError> {
        debug!("Creating slot for doctor {} from {} to {}", doctor_id, start, end);

        // Validate and check overlap at the precision the row is stored with.
        let (start, end) = (to_stored_precision(start), to_stored_precision(end));
        validate_interval(start, end)?;

        let slot_id = Uuid::new_v4();

        // Overlap check and insert are one statement, so two overlapping
        // creations cannot both pass the check.
        let result = sqlx::query(
            "INSERT INTO availability_slots (id, doctor_id, start_at, end_at, is_available, created_at)
             SELECT ?, ?, ?, ?, 1, ?
             WHERE NOT EXISTS (
                 SELECT 1 FROM availability_slots
                 WHERE doctor_id = ? AND start_at < ? AND ? < end_at
             )",
        )
        .bind(slot_id.to_string())
        .bind(doctor_id.to_string())
        .bind(to_millis(start))
        .bind(to_millis(end))
        .bind(to_millis(Utc::now()))
        .bind(doctor_id.to_string())
        .bind(to_millis(end))
        .bind(to_millis(start))
        .execute(&self.pool)
        .await
        .map_err(|e| match SchedulingError::from(e) {
            SchedulingError::NotFound(_) => SchedulingError::not_found("Doctor"),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            warn!("Rejected overlapping slot for doctor {} ({} - {})", doctor_id, start, end);
            return Err(SchedulingError::conflict("slot overlaps an existing slot"));
        }

        info!("Slot {} created for doctor {}", slot_id, doctor_id);
        Ok(slot_id)
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<AvailabilitySlot, SchedulingError> {
        let mut conn = self.pool.acquire().await?;
        self.fetch_slot(&mut conn, slot_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Slot"))
    }

    /// Available slots of one doctor, earliest first.
    pub async fn list_available_slots(&self, doctor_id: Uuid) -> Result<Vec<AvailabilitySlot>, SchedulingError> {
        debug!("Listing available slots for doctor: {}", doctor_id);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM availability_slots
             WHERE doctor_id = ? AND is_available = 1
             ORDER BY start_at",
            SLOT_COLUMNS
        ))
        .bind(doctor_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(slot_from_row).collect()
    }

    /// Available slots starting on `date` (UTC) for doctors of one specialization, earliest first.
    pub async fn list_available_slots_by_specialization(
        &self,
        specialization: Specialization,
        date: NaiveDate,
    ) -> Result<Vec<SlotWithDoctor>, SchedulingError> {
        debug!("Searching {} slots on {}", specialization, date);

        let day_start = date.and_time(NaiveTime::MIN).and_utc();
        let day_end = day_start
            .checked_add_days(Days::new(1))
            .ok_or_else(|| SchedulingError::Validation(format!("date out of range: {}", date)))?;

        let rows = sqlx::query(
            "SELECT s.id, s.doctor_id, s.start_at, s.end_at, s.is_available, s.created_at,
                    d.first_name, d.last_name, d.specialization
             FROM availability_slots s
             JOIN doctors d ON d.id = s.doctor_id
             WHERE d.specialization = ? AND s.is_available = 1
               AND s.start_at >= ? AND s.start_at < ?
             ORDER BY s.start_at",
        )
        .bind(specialization.as_str())
        .bind(to_millis(day_start))
        .bind(to_millis(day_end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SlotWithDoctor, SchedulingError> {
                Ok(SlotWithDoctor {
                    slot: slot_from_row(row)?,
                    doctor_first_name: row.try_get("first_name")?,
                    doctor_last_name: row.try_get("last_name")?,
                    specialization,
                })
            })
            .collect()
    }

    /// Unconditional flag write.
    pub async fn set_availability(&self, slot_id: Uuid, available: bool) -> Result<(), SchedulingError> {
        let mut conn = self.pool.acquire().await?;
        self.set_availability_in(&mut conn, slot_id, available).await
    }

    pub async fn delete_slot(&self, slot_id: Uuid) -> Result<AvailabilitySlot, SchedulingError> {
        let mut conn = self.pool.acquire().await?;
        self.delete_slot_in(&mut conn, slot_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Slot"))
    }

    // --------------------------------------------------------------------------
    // Transaction-scoped primitives
    // --------------------------------------------------------------------------

    pub async fn fetch_slot(
        &self,
        conn: &mut SqliteConnection,
        slot_id: Uuid,
    ) -> Result<Option<AvailabilitySlot>, SchedulingError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM availability_slots WHERE id = ?",
            SLOT_COLUMNS
        ))
        .bind(slot_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(slot_from_row).transpose()
    }

    /// Atomically flip an available slot of `doctor_id` to unavailable.
    ///
    /// Returns `false` when no row matched: the slot is gone, belongs to
    /// another doctor, or is already taken.
    pub async fn reserve_slot(
        &self,
        conn: &mut SqliteConnection,
        slot_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<bool, SchedulingError> {
        let result = sqlx::query(
            "UPDATE availability_slots SET is_available = 0
             WHERE id = ? AND doctor_id = ? AND is_available = 1",
        )
        .bind(slot_id.to_string())
        .bind(doctor_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Mark the slot available again unless a scheduled appointment still holds it.
    ///
    /// Returns `true` when the slot is available afterwards.
    pub async fn release_slot(
        &self,
        conn: &mut SqliteConnection,
        slot_id: Uuid,
    ) -> Result<bool, SchedulingError> {
        let result = sqlx::query(
            "UPDATE availability_slots SET is_available = 1
             WHERE id = ?
               AND NOT EXISTS (
                   SELECT 1 FROM appointments
                   WHERE slot_id = availability_slots.id AND status = 'scheduled'
               )",
        )
        .bind(slot_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_availability_in(
        &self,
        conn: &mut SqliteConnection,
        slot_id: Uuid,
        available: bool,
    ) -> Result<(), SchedulingError> {
        let result = sqlx::query("UPDATE availability_slots SET is_available = ? WHERE id = ?")
            .bind(available)
            .bind(slot_id.to_string())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulingError::not_found("Slot"));
        }

        debug!("Slot {} availability set to {}", slot_id, available);
        Ok(())
    }

    pub async fn delete_slot_in(
        &self,
        conn: &mut SqliteConnection,
        slot_id: Uuid,
    ) -> Result<Option<AvailabilitySlot>, SchedulingError> {
        let row = sqlx::query(&format!(
            "DELETE FROM availability_slots WHERE id = ? RETURNING {}",
            SLOT_COLUMNS
        ))
        .bind(slot_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        let deleted = row.as_ref().map(slot_from_row).transpose()?;
        if deleted.is_some() {
            info!("Slot {} deleted", slot_id);
        }
        Ok(deleted)
    }
}

/// `start` must be strictly before `end`.
pub fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulingError> {
    if start >= end {
        return Err(SchedulingError::Validation(
            "Start time must be before end time".to_string(),
        ));
    }
    Ok(())
}

fn slot_from_row(row: &SqliteRow) -> Result<AvailabilitySlot, SchedulingError> {
    Ok(AvailabilitySlot {
        id: uuid_column(row, "id")?,
        doctor_id: uuid_column(row, "doctor_id")?,
        start_time: instant_column(row, "start_at")?,
        end_time: instant_column(row, "end_at")?,
        is_available: row.try_get("is_available")?,
        created_at: instant_column(row, "created_at")?,
    })
}
