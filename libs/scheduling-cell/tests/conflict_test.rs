// libs/scheduling-cell/tests/conflict_test.rs
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use scheduling_cell::models::{Appointment, AppointmentStatus};
use scheduling_cell::services::conflict::ConflictDetectionService;
use scheduling_cell::store::{AppointmentStore, MemoryStore};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 20, hour, minute, 0).unwrap()
}

fn appointment(
    doctor_id: Uuid,
    start: DateTime<Utc>,
    duration_minutes: i32,
    status: AppointmentStatus,
) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id,
        start_time: start,
        duration_minutes,
        status,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

async fn setup(existing: Vec<Appointment>) -> (ConflictDetectionService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    for apt in existing {
        store.create(apt).await.unwrap();
    }
    let service = ConflictDetectionService::new(store.clone() as Arc<dyn AppointmentStore>);
    (service, store)
}

#[tokio::test]
async fn overlapping_active_appointment_is_reported() {
    let doctor_id = Uuid::new_v4();
    let existing = appointment(doctor_id, at(14, 0), 30, AppointmentStatus::Pending);
    let existing_id = existing.id;
    let (service, _store) = setup(vec![existing]).await;

    // 14:15-14:45 overlaps 14:00-14:30.
    let conflict = service
        .check_conflict(doctor_id, at(14, 15), 30, None)
        .await
        .unwrap();

    assert_eq!(conflict.map(|apt| apt.id), Some(existing_id));
}

#[tokio::test]
async fn back_to_back_booking_is_not_a_conflict() {
    let doctor_id = Uuid::new_v4();
    let (service, _store) = setup(vec![appointment(
        doctor_id,
        at(14, 0),
        30,
        AppointmentStatus::Confirmed,
    )])
    .await;

    let conflict = service
        .check_conflict(doctor_id, at(14, 30), 30, None)
        .await
        .unwrap();

    assert!(conflict.is_none());
}

#[tokio::test]
async fn cancelled_and_completed_appointments_never_conflict() {
    let doctor_id = Uuid::new_v4();
    let (service, _store) = setup(vec![
        appointment(doctor_id, at(14, 0), 30, AppointmentStatus::Cancelled),
        appointment(doctor_id, at(14, 0), 30, AppointmentStatus::Completed),
    ])
    .await;

    let conflict = service
        .check_conflict(doctor_id, at(14, 0), 30, None)
        .await
        .unwrap();

    assert!(conflict.is_none());
}

#[tokio::test]
async fn other_doctors_appointments_are_ignored() {
    let doctor_id = Uuid::new_v4();
    let other_doctor = Uuid::new_v4();
    let (service, _store) = setup(vec![appointment(
        other_doctor,
        at(14, 0),
        30,
        AppointmentStatus::Confirmed,
    )])
    .await;

    let conflict = service
        .check_conflict(doctor_id, at(14, 0), 30, None)
        .await
        .unwrap();

    assert!(conflict.is_none());
}

#[tokio::test]
async fn excluded_appointment_does_not_block_its_own_reschedule() {
    let doctor_id = Uuid::new_v4();
    let existing = appointment(doctor_id, at(14, 0), 30, AppointmentStatus::Pending);
    let existing_id = existing.id;
    let (service, _store) = setup(vec![existing]).await;

    let conflict = service
        .check_conflict(doctor_id, at(14, 0), 30, Some(existing_id))
        .await
        .unwrap();

    assert!(conflict.is_none());
}

#[tokio::test]
async fn earliest_conflict_is_returned_first() {
    let doctor_id = Uuid::new_v4();
    let first = appointment(doctor_id, at(10, 0), 60, AppointmentStatus::Confirmed);
    let second = appointment(doctor_id, at(11, 0), 60, AppointmentStatus::Confirmed);
    let first_id = first.id;
    // Insert out of order; the store query sorts ascending.
    let (service, _store) = setup(vec![second, first]).await;

    // 10:30-11:30 overlaps both.
    let conflict = service
        .check_conflict(doctor_id, at(10, 30), 60, None)
        .await
        .unwrap();

    assert_eq!(conflict.map(|apt| apt.id), Some(first_id));
}

#[tokio::test]
async fn fetch_window_catches_longest_prior_appointment() {
    let doctor_id = Uuid::new_v4();
    // A 240-minute appointment starting 239 minutes before the candidate
    // still overlaps it by one minute.
    let (service, _store) = setup(vec![appointment(
        doctor_id,
        at(10, 1),
        240,
        AppointmentStatus::Confirmed,
    )])
    .await;

    let conflict = service
        .check_conflict(doctor_id, at(14, 0), 30, None)
        .await
        .unwrap();

    assert!(conflict.is_some());
}

#[tokio::test]
async fn appointment_ending_exactly_at_candidate_start_is_free() {
    let doctor_id = Uuid::new_v4();
    let (service, _store) = setup(vec![appointment(
        doctor_id,
        at(10, 0),
        240,
        AppointmentStatus::Confirmed,
    )])
    .await;

    // Ends exactly at 14:00, candidate starts at 14:00.
    let conflict = service
        .check_conflict(doctor_id, at(14, 0), 30, None)
        .await
        .unwrap();

    assert!(conflict.is_none());
}
