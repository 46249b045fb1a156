// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use doctor_cell::{CreateSlotRequest, SetAvailabilityRequest, SlotSearchQuery, Specialization};
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{Appointment, AppointmentScope, BookAppointmentRequest};
use crate::state::SchedulingState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct PatientAppointmentsQuery {
    #[serde(default)]
    pub scope: AppointmentScope,
}

// ==============================================================================
// AUTHORIZATION HELPERS
// ==============================================================================

async fn ensure_doctor_owner(
    state: &SchedulingState,
    user: &User,
    doctor_id: Uuid,
) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    match state.directory.doctor_owner(doctor_id).await? {
        Some(owner) if user.is_doctor() && owner == user.id => Ok(()),
        _ => Err(AppError::Forbidden("Not authorized for this doctor".to_string())),
    }
}

async fn ensure_patient_owner(
    state: &SchedulingState,
    user: &User,
    patient_id: Uuid,
) -> Result<(), AppError> {
    if user.is_admin() {
        return Ok(());
    }

    match state.directory.patient_owner(patient_id).await? {
        Some(owner) if user.is_patient() && owner == user.id => Ok(()),
        _ => Err(AppError::Forbidden("Not authorized for this patient".to_string())),
    }
}

/// Admin, the patient on the appointment, or its doctor.
async fn ensure_appointment_party(
    state: &SchedulingState,
    user: &User,
    appointment: &Appointment,
) -> Result<(), AppError> {
    if ensure_patient_owner(state, user, appointment.patient_id).await.is_ok() {
        return Ok(());
    }
    ensure_doctor_owner(state, user, appointment.doctor_id).await
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

pub async fn create_slot(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_doctor_owner(&state, &user, request.doctor_id).await?;

    let slot_id = state
        .slots
        .create_slot(request.doctor_id, request.start_time, request.end_time)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "slot_id": slot_id,
        })),
    ))
}

pub async fn get_slot(
    State(state): State<Arc<SchedulingState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slot = state.slots.get_slot(slot_id).await?;

    Ok(Json(json!({
        "success": true,
        "slot": slot,
    })))
}

pub async fn search_slots(
    State(state): State<Arc<SchedulingState>>,
    Query(query): Query<SlotSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let specialization: Specialization = query
        .specialization
        .parse()
        .map_err(AppError::BadRequest)?;

    let slots = state
        .slots
        .list_available_slots_by_specialization(specialization, query.date)
        .await?;

    Ok(Json(json!({
        "success": true,
        "slots": slots,
        "total": slots.len(),
    })))
}

pub async fn list_doctor_slots(
    State(state): State<Arc<SchedulingState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slots = state.slots.list_available_slots(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "slots": slots,
        "total": slots.len(),
    })))
}

pub async fn set_slot_availability(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let slot = state.slots.get_slot(slot_id).await?;
    ensure_doctor_owner(&state, &user, slot.doctor_id).await?;

    state
        .coordinator
        .set_slot_availability(slot_id, request.is_available)
        .await?;

    Ok(Json(json!({
        "success": true,
        "slot_id": slot_id,
        "is_available": request.is_available,
    })))
}

pub async fn delete_slot(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slot = state.slots.get_slot(slot_id).await?;
    ensure_doctor_owner(&state, &user, slot.doctor_id).await?;

    let deleted = state.coordinator.delete_slot(slot_id).await?;

    Ok(Json(json!({
        "success": true,
        "slot": deleted,
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_patient_owner(&state, &user, request.patient_id).await?;

    let appointment = state.coordinator.book_appointment(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
        })),
    ))
}

pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.appointments.get_appointment(appointment_id).await?;
    ensure_appointment_party(&state, &user, &appointment).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.appointments.get_appointment(appointment_id).await?;
    ensure_appointment_party(&state, &user, &appointment).await?;

    let cancelled = state.coordinator.cancel_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": cancelled,
    })))
}

pub async fn complete_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.appointments.get_appointment(appointment_id).await?;
    ensure_doctor_owner(&state, &user, appointment.doctor_id).await?;

    let completed = state.coordinator.complete_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": completed,
    })))
}

pub async fn delete_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.appointments.get_appointment(appointment_id).await?;
    ensure_doctor_owner(&state, &user, appointment.doctor_id).await?;

    let deleted = state.coordinator.delete_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": deleted,
    })))
}

pub async fn list_patient_appointments(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<PatientAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_patient_owner(&state, &user, patient_id).await?;

    let now = Utc::now();
    let appointments = match query.scope {
        AppointmentScope::All => state.appointments.list_by_patient(patient_id).await?,
        AppointmentScope::Upcoming => state.appointments.list_upcoming_by_patient(patient_id, now).await?,
        AppointmentScope::Past => state.appointments.list_past_by_patient(patient_id, now).await?,
    };

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

pub async fn list_doctor_appointments(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_doctor_owner(&state, &user, doctor_id).await?;

    let appointments = state.appointments.list_by_doctor(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

// ==============================================================================
// NOTIFICATION HANDLERS
// ==============================================================================

pub async fn list_notifications(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let notifications = state.inbox.list_for_user(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "notifications": notifications,
        "total": notifications.len(),
    })))
}

pub async fn mark_notification_read(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notification = state.inbox.get(notification_id).await?;
    if notification.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden("Not authorized for this notification".to_string()));
    }

    state.inbox.mark_read(notification_id).await?;

    Ok(Json(json!({
        "success": true,
        "notification_id": notification_id,
    })))
}
