use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// DOCTOR RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub specialization: Specialization,
    pub license_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    Cardiology,
    Dermatology,
    Neurology,
    Pediatrics,
    Ophthalmology,
    Orthopedics,
    Psychiatry,
    Rheumatology,
    Gynecology,
    Oncology,
    GeneralMedicine,
}

impl Specialization {
    pub const ALL: [Specialization; 11] = [
        Specialization::Cardiology,
        Specialization::Dermatology,
        Specialization::Neurology,
        Specialization::Pediatrics,
        Specialization::Ophthalmology,
        Specialization::Orthopedics,
        Specialization::Psychiatry,
        Specialization::Rheumatology,
        Specialization::Gynecology,
        Specialization::Oncology,
        Specialization::GeneralMedicine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialization::Cardiology => "cardiology",
            Specialization::Dermatology => "dermatology",
            Specialization::Neurology => "neurology",
            Specialization::Pediatrics => "pediatrics",
            Specialization::Ophthalmology => "ophthalmology",
            Specialization::Orthopedics => "orthopedics",
            Specialization::Psychiatry => "psychiatry",
            Specialization::Rheumatology => "rheumatology",
            Specialization::Gynecology => "gynecology",
            Specialization::Oncology => "oncology",
            Specialization::GeneralMedicine => "general_medicine",
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialization {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Specialization::ALL
            .iter()
            .copied()
            .find(|specialization| specialization.as_str() == value)
            .ok_or_else(|| format!("Unknown specialization: {}", value))
    }
}

// ==============================================================================
// AVAILABILITY SLOTS
// ==============================================================================

/// A doctor-owned `[start_time, end_time)` interval that at most one
/// scheduled appointment can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    /// Half-open interval overlap: adjacent slots do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }

    pub fn belongs_to(&self, doctor_id: Uuid) -> bool {
        self.doctor_id == doctor_id
    }
}

/// Search projection: an available slot joined with its doctor's attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotWithDoctor {
    pub slot: AvailabilitySlot,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
    pub specialization: Specialization,
}

impl SlotWithDoctor {
    pub fn doctor_full_name(&self) -> String {
        format!("{} {}", self.doctor_first_name, self.doctor_last_name)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSearchQuery {
    pub specialization: String,
    pub date: NaiveDate,
}
