// libs/appointment-cell/src/services/directory.rs
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use doctor_cell::DoctorService;
use patient_cell::PatientService;
use shared_models::error::SchedulingError;

/// Existence and ownership facts about patients and doctors.
///
/// Owners are identity ids as carried in the bearer token's `sub` claim.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError>;

    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, SchedulingError>;

    async fn patient_owner(&self, patient_id: Uuid) -> Result<Option<String>, SchedulingError>;

    async fn doctor_owner(&self, doctor_id: Uuid) -> Result<Option<String>, SchedulingError>;

    async fn doctor_name(&self, doctor_id: Uuid) -> Result<Option<String>, SchedulingError>;
}

/// Directory backed by the `patients` and `doctors` tables.
#[derive(Clone)]
pub struct SqlDirectory {
    patients: PatientService,
    doctors: DoctorService,
}

impl SqlDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            patients: PatientService::new(pool.clone()),
            doctors: DoctorService::new(pool),
        }
    }
}

#[async_trait]
impl Directory for SqlDirectory {
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError> {
        Ok(self.patients.find_patient(patient_id).await?.is_some())
    }

    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, SchedulingError> {
        Ok(self.doctors.find_doctor(doctor_id).await?.is_some())
    }

    async fn patient_owner(&self, patient_id: Uuid) -> Result<Option<String>, SchedulingError> {
        Ok(self
            .patients
            .find_patient(patient_id)
            .await?
            .map(|patient| patient.user_id))
    }

    async fn doctor_owner(&self, doctor_id: Uuid) -> Result<Option<String>, SchedulingError> {
        Ok(self
            .doctors
            .find_doctor(doctor_id)
            .await?
            .map(|doctor| doctor.user_id))
    }

    async fn doctor_name(&self, doctor_id: Uuid) -> Result<Option<String>, SchedulingError> {
        Ok(self
            .doctors
            .find_doctor(doctor_id)
            .await?
            .map(|doctor| doctor.full_name()))
    }
}
