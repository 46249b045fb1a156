use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use shared_database::codec::{instant_column, uuid_column};
use shared_models::error::SchedulingError;

use crate::models::{Doctor, Specialization};

const DOCTOR_COLUMNS: &str =
    "id, user_id, first_name, last_name, specialization, license_number, created_at";

/// Read access to doctor records.
#[derive(Clone)]
pub struct DoctorService {
    pool: SqlitePool,
}

impl DoctorService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SchedulingError> {
        debug!("Fetching doctor: {}", doctor_id);

        let row = sqlx::query(&format!("SELECT {} FROM doctors WHERE id = ?", DOCTOR_COLUMNS))
            .bind(doctor_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(doctor_from_row).transpose()
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, SchedulingError> {
        self.find_doctor(doctor_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Doctor"))
    }

    pub async fn list_by_specialization(
        &self,
        specialization: Specialization,
    ) -> Result<Vec<Doctor>, SchedulingError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM doctors WHERE specialization = ? ORDER BY last_name, first_name",
            DOCTOR_COLUMNS
        ))
        .bind(specialization.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(doctor_from_row).collect()
    }
}

fn doctor_from_row(row: &SqliteRow) -> Result<Doctor, SchedulingError> {
    let specialization: String = row.try_get("specialization")?;

    Ok(Doctor {
        id: uuid_column(row, "id")?,
        user_id: row.try_get("user_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        specialization: specialization
            .parse()
            .map_err(SchedulingError::Unexpected)?,
        license_number: row.try_get("license_number")?,
        created_at: instant_column(row, "created_at")?,
    })
}
