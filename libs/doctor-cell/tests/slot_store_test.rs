use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use doctor_cell::models::Specialization;
use doctor_cell::services::{DoctorService, SlotStore};
use shared_models::error::SchedulingError;
use shared_utils::test_utils::{seed_doctor, test_pool};

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, day, hour, minute, 0).unwrap()
}

async fn store_with_doctor() -> (SlotStore, Uuid, sqlx::SqlitePool) {
    let pool = test_pool().await;
    let doctor_id = seed_doctor(&pool, "doctor-user", "Jan", "Kowalski", "cardiology").await;
    (SlotStore::new(pool.clone()), doctor_id, pool)
}

#[tokio::test]
async fn test_create_slot_defaults_to_available() {
    let (store, doctor_id, _pool) = store_with_doctor().await;

    let slot_id = store.create_slot(doctor_id, at(3, 9, 0), at(3, 9, 30)).await.unwrap();
    let slot = store.get_slot(slot_id).await.unwrap();

    assert_eq!(slot.doctor_id, doctor_id);
    assert_eq!(slot.start_time, at(3, 9, 0));
    assert_eq!(slot.end_time, at(3, 9, 30));
    assert!(slot.is_available);
}

#[tokio::test]
async fn test_create_slot_rejects_malformed_interval() {
    let (store, doctor_id, _pool) = store_with_doctor().await;

    assert_matches!(
        store.create_slot(doctor_id, at(3, 10, 0), at(3, 9, 0)).await,
        Err(SchedulingError::Validation(_))
    );
    assert_matches!(
        store.create_slot(doctor_id, at(3, 10, 0), at(3, 10, 0)).await,
        Err(SchedulingError::Validation(_))
    );
}

#[tokio::test]
async fn test_overlap_rejected_adjacent_accepted() {
    let (store, doctor_id, _pool) = store_with_doctor().await;

    store.create_slot(doctor_id, at(3, 9, 0), at(3, 9, 30)).await.unwrap();

    assert_matches!(
        store.create_slot(doctor_id, at(3, 9, 15), at(3, 9, 45)).await,
        Err(SchedulingError::Conflict(_))
    );
    assert_matches!(
        store.create_slot(doctor_id, at(3, 8, 0), at(3, 12, 0)).await,
        Err(SchedulingError::Conflict(_))
    );
    assert!(store.create_slot(doctor_id, at(3, 9, 30), at(3, 10, 0)).await.is_ok());
    assert!(store.create_slot(doctor_id, at(3, 8, 30), at(3, 9, 0)).await.is_ok());
}

#[tokio::test]
async fn test_sub_millisecond_bounds_follow_stored_precision() {
    let (store, doctor_id, _pool) = store_with_doctor().await;
    let micros = chrono::Duration::microseconds;

    store.create_slot(doctor_id, at(3, 9, 0), at(3, 9, 30)).await.unwrap();

    // Starts 500us before the existing slot ends.
    assert_matches!(
        store.create_slot(doctor_id, at(3, 9, 30) - micros(500), at(3, 10, 0)).await,
        Err(SchedulingError::Conflict(_))
    );

    // Ends 500us past the existing start; stored as an adjacent slot.
    let slot_id = store
        .create_slot(doctor_id, at(3, 8, 30), at(3, 9, 0) + micros(500))
        .await
        .unwrap();
    assert_eq!(store.get_slot(slot_id).await.unwrap().end_time, at(3, 9, 0));

    // Collapses to an empty interval once truncated.
    assert_matches!(
        store
            .create_slot(doctor_id, at(3, 11, 0) + micros(100), at(3, 11, 0) + micros(600))
            .await,
        Err(SchedulingError::Validation(_))
    );
}

#[tokio::test]
async fn test_overlap_checked_against_unavailable_slots() {
    let (store, doctor_id, _pool) = store_with_doctor().await;

    let slot_id = store.create_slot(doctor_id, at(3, 9, 0), at(3, 9, 30)).await.unwrap();
    store.set_availability(slot_id, false).await.unwrap();

    assert_matches!(
        store.create_slot(doctor_id, at(3, 9, 0), at(3, 9, 30)).await,
        Err(SchedulingError::Conflict(_))
    );
}

#[tokio::test]
async fn test_overlap_is_per_doctor() {
    let (store, doctor_id, pool) = store_with_doctor().await;
    let other_doctor = seed_doctor(&pool, "other-user", "Ewa", "Nowak", "neurology").await;

    store.create_slot(doctor_id, at(3, 9, 0), at(3, 9, 30)).await.unwrap();

    assert!(store.create_slot(other_doctor, at(3, 9, 0), at(3, 9, 30)).await.is_ok());
}

#[tokio::test]
async fn test_create_slot_for_unknown_doctor_is_not_found() {
    let (store, _doctor_id, _pool) = store_with_doctor().await;

    assert_matches!(
        store.create_slot(Uuid::new_v4(), at(3, 9, 0), at(3, 9, 30)).await,
        Err(SchedulingError::NotFound(entity)) if entity == "Doctor"
    );
}

#[tokio::test]
async fn test_list_available_slots_is_ordered_and_filtered() {
    let (store, doctor_id, _pool) = store_with_doctor().await;

    let late = store.create_slot(doctor_id, at(4, 14, 0), at(4, 14, 30)).await.unwrap();
    let early = store.create_slot(doctor_id, at(3, 9, 0), at(3, 9, 30)).await.unwrap();
    let withdrawn = store.create_slot(doctor_id, at(3, 11, 0), at(3, 11, 30)).await.unwrap();
    store.set_availability(withdrawn, false).await.unwrap();

    let slots = store.list_available_slots(doctor_id).await.unwrap();
    let ids: Vec<Uuid> = slots.iter().map(|slot| slot.id).collect();

    assert_eq!(ids, vec![early, late]);
}

#[tokio::test]
async fn test_search_by_specialization_and_date() {
    let (store, cardiologist, pool) = store_with_doctor().await;
    let neurologist = seed_doctor(&pool, "neuro-user", "Ewa", "Nowak", "neurology").await;

    let second = store.create_slot(cardiologist, at(3, 13, 0), at(3, 13, 30)).await.unwrap();
    let first = store.create_slot(cardiologist, at(3, 8, 0), at(3, 8, 30)).await.unwrap();
    store.create_slot(cardiologist, at(4, 8, 0), at(4, 8, 30)).await.unwrap();
    store.create_slot(neurologist, at(3, 9, 0), at(3, 9, 30)).await.unwrap();
    let booked = store.create_slot(cardiologist, at(3, 15, 0), at(3, 15, 30)).await.unwrap();
    store.set_availability(booked, false).await.unwrap();

    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
    let results = store
        .list_available_slots_by_specialization(Specialization::Cardiology, date)
        .await
        .unwrap();

    let ids: Vec<Uuid> = results.iter().map(|result| result.slot.id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(results[0].doctor_full_name(), "Jan Kowalski");
    assert_eq!(results[0].specialization, Specialization::Cardiology);
}

#[tokio::test]
async fn test_set_availability_on_missing_slot_is_not_found() {
    let (store, _doctor_id, _pool) = store_with_doctor().await;

    assert_matches!(
        store.set_availability(Uuid::new_v4(), true).await,
        Err(SchedulingError::NotFound(_))
    );
}

#[tokio::test]
async fn test_delete_slot_returns_deleted_row() {
    let (store, doctor_id, _pool) = store_with_doctor().await;

    let slot_id = store.create_slot(doctor_id, at(3, 9, 0), at(3, 9, 30)).await.unwrap();

    let deleted = store.delete_slot(slot_id).await.unwrap();
    assert_eq!(deleted.id, slot_id);

    assert_matches!(store.get_slot(slot_id).await, Err(SchedulingError::NotFound(_)));
    assert_matches!(store.delete_slot(slot_id).await, Err(SchedulingError::NotFound(_)));
}

#[tokio::test]
async fn test_reserve_slot_is_conditional() {
    let (store, doctor_id, pool) = store_with_doctor().await;
    let slot_id = store.create_slot(doctor_id, at(3, 9, 0), at(3, 9, 30)).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();

    assert!(!store.reserve_slot(&mut conn, slot_id, Uuid::new_v4()).await.unwrap());
    assert!(store.reserve_slot(&mut conn, slot_id, doctor_id).await.unwrap());
    assert!(!store.reserve_slot(&mut conn, slot_id, doctor_id).await.unwrap());

    assert!(store.release_slot(&mut conn, slot_id).await.unwrap());
    drop(conn);

    assert!(store.get_slot(slot_id).await.unwrap().is_available);
}

#[tokio::test]
async fn test_doctor_service_lookups() {
    let (_store, doctor_id, pool) = store_with_doctor().await;
    let doctors = DoctorService::new(pool);

    let doctor = doctors.get_doctor(doctor_id).await.unwrap();
    assert_eq!(doctor.full_name(), "Jan Kowalski");
    assert_eq!(doctor.user_id, "doctor-user");
    assert_eq!(doctor.specialization, Specialization::Cardiology);

    assert!(doctors.find_doctor(Uuid::new_v4()).await.unwrap().is_none());
    assert_matches!(doctors.get_doctor(Uuid::new_v4()).await, Err(SchedulingError::NotFound(_)));

    let cardiologists = doctors.list_by_specialization(Specialization::Cardiology).await.unwrap();
    assert_eq!(cardiologists.len(), 1);
    assert!(doctors.list_by_specialization(Specialization::Oncology).await.unwrap().is_empty());
}
