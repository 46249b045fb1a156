// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::{AvailabilitySlot, SlotStore};
use shared_models::error::SchedulingError;

use crate::models::{Appointment, AppointmentStatus, BookAppointmentRequest};
use crate::services::directory::Directory;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notification::{Notifier, NotifyError};
use crate::services::store::AppointmentStore;

/// The only component that changes slots and appointments together.
///
/// Every operation runs in one short transaction whose first statement is a
/// write, so SQLite hands out the write lock before anything is read inside
/// it. Reads done beforehand only pick the error to report; the conditional
/// writes decide the outcome. Notifications go out after commit, bounded by
/// `notify_timeout`; failures and timeouts are logged, never returned.
#[derive(Clone)]
pub struct BookingCoordinator {
    pool: SqlitePool,
    slots: SlotStore,
    appointments: AppointmentStore,
    lifecycle: AppointmentLifecycleService,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

impl BookingCoordinator {
    pub fn new(
        pool: SqlitePool,
        directory: Arc<dyn Directory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            slots: SlotStore::new(pool.clone()),
            appointments: AppointmentStore::new(pool.clone()),
            lifecycle: AppointmentLifecycleService::new(),
            pool,
            directory,
            notifier,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_notify_timeout(mut self, notify_timeout: Duration) -> Self {
        self.notify_timeout = notify_timeout;
        self
    }

    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        let BookAppointmentRequest { patient_id, doctor_id, slot_id } = request;
        debug!("Booking slot {} with doctor {} for patient {}", slot_id, doctor_id, patient_id);

        if !self.directory.patient_exists(patient_id).await? {
            return Err(SchedulingError::not_found("Patient"));
        }
        if !self.directory.doctor_exists(doctor_id).await? {
            return Err(SchedulingError::not_found("Doctor"));
        }

        let slot = self.slots.get_slot(slot_id).await?;
        if !slot.belongs_to(doctor_id) {
            warn!("Slot {} does not belong to doctor {}", slot_id, doctor_id);
            return Err(SchedulingError::conflict("slot does not belong to doctor"));
        }
        if !slot.is_available {
            warn!("Slot {} is already booked", slot_id);
            return Err(SchedulingError::conflict("slot already booked"));
        }

        let mut tx = self.pool.begin().await?;

        if !self.slots.reserve_slot(&mut *tx, slot_id, doctor_id).await? {
            // Lost the race after the read above; dropping `tx` rolls back.
            warn!("Slot {} was taken by a concurrent booking", slot_id);
            return Err(SchedulingError::conflict("slot already booked"));
        }

        let appointment = self
            .appointments
            .create_appointment(&mut *tx, patient_id, doctor_id, slot_id, slot.start_time)
            .await?;

        tx.commit().await?;
        info!("Appointment {} booked on slot {}", appointment.id, slot_id);

        self.notify_created(&appointment).await;
        Ok(appointment)
    }

    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::Cancelled).await
    }

    /// Completed appointments keep their slot consumed.
    pub async fn complete_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.transition(appointment_id, AppointmentStatus::Completed).await
    }

    /// Hard delete. The slot is released if no other scheduled appointment holds it.
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let mut tx = self.pool.begin().await?;

        let deleted = self
            .appointments
            .delete_appointment_in(&mut *tx, appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Appointment"))?;

        if deleted.holds_slot() {
            self.slots.release_slot(&mut *tx, deleted.slot_id).await?;
        }

        tx.commit().await?;
        info!("Appointment {} deleted, slot {} released", appointment_id, deleted.slot_id);
        Ok(deleted)
    }

    /// Delete a slot, cancelling the scheduled appointment bound to it first.
    pub async fn delete_slot(&self, slot_id: Uuid) -> Result<AvailabilitySlot, SchedulingError> {
        let mut tx = self.pool.begin().await?;

        let deleted = self
            .slots
            .delete_slot_in(&mut *tx, slot_id)
            .await?
            .ok_or_else(|| SchedulingError::not_found("Slot"))?;

        let cancelled = match self.appointments.find_scheduled_by_slot_in(&mut *tx, slot_id).await? {
            Some(holder) => {
                self.appointments
                    .set_status_in(&mut *tx, &holder, AppointmentStatus::Cancelled)
                    .await?;
                Some(Appointment {
                    status: AppointmentStatus::Cancelled,
                    ..holder
                })
            }
            None => None,
        };

        tx.commit().await?;
        info!("Slot {} deleted", slot_id);

        if let Some(appointment) = cancelled {
            info!("Appointment {} cancelled with its slot", appointment.id);
            self.notify_status_changed(&appointment).await;
        }
        Ok(deleted)
    }

    /// Re-opening a slot that a scheduled appointment holds is a Conflict;
    /// withdrawing a free slot is always allowed.
    pub async fn set_slot_availability(&self, slot_id: Uuid, available: bool) -> Result<(), SchedulingError> {
        let mut tx = self.pool.begin().await?;

        self.slots.set_availability_in(&mut *tx, slot_id, available).await?;

        if available
            && self
                .appointments
                .find_scheduled_by_slot_in(&mut *tx, slot_id)
                .await?
                .is_some()
        {
            warn!("Refused to re-open slot {} while it is booked", slot_id);
            return Err(SchedulingError::conflict("slot is held by a scheduled appointment"));
        }

        tx.commit().await?;
        info!("Slot {} availability set to {}", slot_id, available);
        Ok(())
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.appointments.get_appointment(appointment_id).await?;

        let mut tx = self.pool.begin().await?;

        // Conditional on the status read above; a concurrent transition makes
        // this fail with InvalidTransition.
        self.appointments
            .set_status_in(&mut *tx, &current, new_status)
            .await?;

        if self.lifecycle.releases_slot(&new_status) {
            self.slots.release_slot(&mut *tx, current.slot_id).await?;
        }

        tx.commit().await?;

        let updated = Appointment {
            status: new_status,
            ..current
        };
        self.notify_status_changed(&updated).await;
        Ok(updated)
    }

    // --------------------------------------------------------------------------
    // Post-commit notifications
    // --------------------------------------------------------------------------

    async fn notify_created(&self, appointment: &Appointment) {
        let Some((owner, doctor_name)) = self.recipients(appointment).await else {
            return;
        };

        let delivery = self
            .notifier
            .on_appointment_created(&owner, &doctor_name, appointment.appointment_time);
        self.await_delivery(appointment, delivery).await;
    }

    async fn notify_status_changed(&self, appointment: &Appointment) {
        let Some((owner, doctor_name)) = self.recipients(appointment).await else {
            return;
        };

        let delivery = self
            .notifier
            .on_appointment_status_changed(&owner, &doctor_name, appointment.status);
        self.await_delivery(appointment, delivery).await;
    }

    async fn await_delivery(
        &self,
        appointment: &Appointment,
        delivery: impl std::future::Future<Output = Result<(), NotifyError>>,
    ) {
        match timeout(self.notify_timeout, delivery).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to notify about appointment {}: {}", appointment.id, e),
            Err(_) => warn!(
                "Notification for appointment {} timed out after {:?}",
                appointment.id, self.notify_timeout
            ),
        }
    }

    async fn recipients(&self, appointment: &Appointment) -> Option<(String, String)> {
        let owner = self.directory.patient_owner(appointment.patient_id).await;
        let doctor_name = self.directory.doctor_name(appointment.doctor_id).await;

        match (owner, doctor_name) {
            (Ok(Some(owner)), Ok(Some(doctor_name))) => Some((owner, doctor_name)),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Skipping notification for appointment {}: {}", appointment.id, e);
                None
            }
            _ => {
                warn!("Skipping notification for appointment {}: recipient unknown", appointment.id);
                None
            }
        }
    }
}
