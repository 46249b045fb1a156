use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentStatus};
use appointment_cell::services::AppointmentStore;
use doctor_cell::SlotStore;
use shared_models::error::SchedulingError;
use shared_utils::test_utils::{seed_doctor, seed_patient, test_pool};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, day, hour, 0, 0).unwrap()
}

struct Fixture {
    pool: SqlitePool,
    store: AppointmentStore,
    patient_id: Uuid,
    doctor_id: Uuid,
}

async fn fixture() -> Fixture {
    let pool = test_pool().await;
    let patient_id = seed_patient(&pool, "patient-user", "Anna", "Nowak").await;
    let doctor_id = seed_doctor(&pool, "doctor-user", "Jan", "Kowalski", "cardiology").await;

    Fixture {
        store: AppointmentStore::new(pool.clone()),
        pool,
        patient_id,
        doctor_id,
    }
}

async fn insert(fx: &Fixture, instant: DateTime<Utc>) -> Appointment {
    let mut conn = fx.pool.acquire().await.unwrap();
    fx.store
        .create_appointment(&mut conn, fx.patient_id, fx.doctor_id, Uuid::new_v4(), instant)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_appointment_starts_scheduled() {
    let fx = fixture().await;

    let created = insert(&fx, at(3, 9)).await;
    let fetched = fx.store.get_appointment(created.id).await.unwrap();

    assert_eq!(fetched.status, AppointmentStatus::Scheduled);
    assert_eq!(fetched.appointment_time, at(3, 9));
    assert_eq!(fetched.patient_id, fx.patient_id);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_get_missing_appointment_is_not_found() {
    let fx = fixture().await;

    assert_matches!(
        fx.store.get_appointment(Uuid::new_v4()).await,
        Err(SchedulingError::NotFound(entity)) if entity == "Appointment"
    );
}

#[tokio::test]
async fn test_second_scheduled_appointment_on_slot_is_conflict() {
    let fx = fixture().await;
    let slot_id = Uuid::new_v4();

    let mut conn = fx.pool.acquire().await.unwrap();
    fx.store
        .create_appointment(&mut conn, fx.patient_id, fx.doctor_id, slot_id, at(3, 9))
        .await
        .unwrap();
    let second = fx
        .store
        .create_appointment(&mut conn, fx.patient_id, fx.doctor_id, slot_id, at(3, 9))
        .await;

    assert_matches!(second, Err(SchedulingError::Conflict(_)));
}

#[tokio::test]
async fn test_lists_are_ordered_by_instant_descending() {
    let fx = fixture().await;
    let early = insert(&fx, at(3, 9)).await;
    let late = insert(&fx, at(5, 9)).await;
    let middle = insert(&fx, at(4, 9)).await;

    let by_patient: Vec<Uuid> = fx
        .store
        .list_by_patient(fx.patient_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(by_patient, vec![late.id, middle.id, early.id]);

    let by_doctor: Vec<Uuid> = fx
        .store
        .list_by_doctor(fx.doctor_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(by_doctor, vec![late.id, middle.id, early.id]);
}

#[tokio::test]
async fn test_upcoming_and_past_partition() {
    let fx = fixture().await;
    let now = at(10, 12);

    let past = insert(&fx, now - Duration::days(2)).await;
    let soon = insert(&fx, now + Duration::days(1)).await;
    let later = insert(&fx, now + Duration::days(3)).await;
    let cancelled_future = insert(&fx, now + Duration::days(2)).await;
    fx.store
        .set_status(cancelled_future.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();

    let upcoming: Vec<Uuid> = fx
        .store
        .list_upcoming_by_patient(fx.patient_id, now)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(upcoming, vec![soon.id, later.id]);

    let history: Vec<Uuid> = fx
        .store
        .list_past_by_patient(fx.patient_id, now)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(history, vec![cancelled_future.id, past.id]);
}

#[tokio::test]
async fn test_set_status_follows_state_machine() {
    let fx = fixture().await;
    let appointment = insert(&fx, at(3, 9)).await;

    assert_eq!(
        fx.store
            .set_status(appointment.id, AppointmentStatus::Completed)
            .await
            .unwrap(),
        appointment.id
    );

    assert_matches!(
        fx.store.set_status(appointment.id, AppointmentStatus::Cancelled).await,
        Err(SchedulingError::InvalidTransition { .. })
    );
    assert_eq!(
        fx.store.get_appointment(appointment.id).await.unwrap().status,
        AppointmentStatus::Completed
    );
}

#[tokio::test]
async fn test_stale_status_write_is_rejected() {
    let fx = fixture().await;
    let appointment = insert(&fx, at(3, 9)).await;

    let mut conn = fx.pool.acquire().await.unwrap();
    fx.store
        .set_status_in(&mut conn, &appointment, AppointmentStatus::Cancelled)
        .await
        .unwrap();

    // `appointment` still says scheduled; the stored row no longer does.
    assert_matches!(
        fx.store
            .set_status_in(&mut conn, &appointment, AppointmentStatus::Completed)
            .await,
        Err(SchedulingError::InvalidTransition { .. })
    );
    drop(conn);

    assert_eq!(
        fx.store.get_appointment(appointment.id).await.unwrap().status,
        AppointmentStatus::Cancelled
    );
}

#[tokio::test]
async fn test_store_status_write_leaves_slot_alone() {
    let fx = fixture().await;
    let slots = SlotStore::new(fx.pool.clone());
    let slot_id = slots.create_slot(fx.doctor_id, at(3, 9), at(3, 10)).await.unwrap();

    let appointment = {
        let mut tx = fx.pool.begin().await.unwrap();
        assert!(slots.reserve_slot(&mut tx, slot_id, fx.doctor_id).await.unwrap());
        let appointment = fx
            .store
            .create_appointment(&mut tx, fx.patient_id, fx.doctor_id, slot_id, at(3, 9))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        appointment
    };

    fx.store
        .set_status(appointment.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();

    assert!(!slots.get_slot(slot_id).await.unwrap().is_available);
}

#[tokio::test]
async fn test_set_status_on_missing_appointment_is_not_found() {
    let fx = fixture().await;

    assert_matches!(
        fx.store.set_status(Uuid::new_v4(), AppointmentStatus::Cancelled).await,
        Err(SchedulingError::NotFound(_))
    );
}

#[tokio::test]
async fn test_get_by_slot_returns_only_scheduled() {
    let fx = fixture().await;
    let appointment = insert(&fx, at(3, 9)).await;

    let held = fx.store.get_by_slot(appointment.slot_id).await.unwrap();
    assert_eq!(held.map(|a| a.id), Some(appointment.id));

    fx.store
        .set_status(appointment.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();
    assert!(fx.store.get_by_slot(appointment.slot_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_appointment() {
    let fx = fixture().await;
    let appointment = insert(&fx, at(3, 9)).await;

    let deleted = fx.store.delete_appointment(appointment.id).await.unwrap();
    assert_eq!(deleted.id, appointment.id);

    assert_matches!(
        fx.store.delete_appointment(appointment.id).await,
        Err(SchedulingError::NotFound(_))
    );
}
