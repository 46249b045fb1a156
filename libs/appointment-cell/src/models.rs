// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_id: Uuid,
    /// Copied from the slot's start when the appointment is booked.
    pub appointment_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Scheduled or completed appointments keep their slot consumed.
    pub fn holds_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("Unknown appointment status: {}", other)),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_id: Uuid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentScope {
    #[default]
    All,
    Upcoming,
    Past,
}

// ==============================================================================
// NOTIFICATION MODELS
// ==============================================================================

/// Post-commit event handed to a notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AppointmentEvent {
    AppointmentCreated {
        patient_owner_id: String,
        doctor_name: String,
        appointment_time: DateTime<Utc>,
    },
    AppointmentStatusChanged {
        patient_owner_id: String,
        doctor_name: String,
        new_status: AppointmentStatus,
    },
}

impl AppointmentEvent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            AppointmentEvent::AppointmentCreated { .. } => NotificationKind::AppointmentCreated,
            AppointmentEvent::AppointmentStatusChanged { .. } => NotificationKind::AppointmentStatusChanged,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            AppointmentEvent::AppointmentCreated { patient_owner_id, .. }
            | AppointmentEvent::AppointmentStatusChanged { patient_owner_id, .. } => patient_owner_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentCreated,
    AppointmentStatusChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AppointmentCreated => "appointment_created",
            NotificationKind::AppointmentStatusChanged => "appointment_status_changed",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "appointment_created" => Ok(NotificationKind::AppointmentCreated),
            "appointment_status_changed" => Ok(NotificationKind::AppointmentStatusChanged),
            other => Err(format!("Unknown notification kind: {}", other)),
        }
    }
}

/// Inbox row written by the store-backed notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub kind: NotificationKind,
    pub doctor_name: String,
    pub appointment_time: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
