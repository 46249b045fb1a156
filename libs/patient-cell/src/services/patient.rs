use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use shared_database::codec::{instant_column, uuid_column};
use shared_models::error::SchedulingError;

use crate::models::Patient;

#[derive(Clone)]
pub struct PatientService {
    pool: SqlitePool,
}

impl PatientService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, SchedulingError> {
        debug!("Fetching patient: {}", patient_id);

        let row = sqlx::query(
            "SELECT id, user_id, first_name, last_name, created_at FROM patients WHERE id = ?",
        )
        .bind(patient_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(patient_from_row).transpose()
    }

    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, SchedulingError> {
        self.find_patient(patient_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Patient"))
    }

    /// Patient record owned by an authenticated identity, if any.
    pub async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Patient>, SchedulingError> {
        let row = sqlx::query(
            "SELECT id, user_id, first_name, last_name, created_at FROM patients WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(patient_from_row).transpose()
    }
}

fn patient_from_row(row: &SqliteRow) -> Result<Patient, SchedulingError> {
    Ok(Patient {
        id: uuid_column(row, "id")?,
        user_id: row.try_get("user_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        created_at: instant_column(row, "created_at")?,
    })
}
