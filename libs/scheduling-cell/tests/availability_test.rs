// libs/scheduling-cell/tests/availability_test.rs
use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use scheduling_cell::models::{
    Appointment, AppointmentStatus, DoctorSchedule, SchedulingError, WorkingHours,
};
use scheduling_cell::services::availability::AvailabilityService;
use scheduling_cell::store::{AppointmentStore, MemoryStore};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 20).unwrap()
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 20, hour, minute, 0).unwrap()
}

fn nine_to_five() -> WorkingHours {
    WorkingHours {
        day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        day_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    }
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

async fn setup(
    hours: WorkingHours,
    existing: Vec<Appointment>,
) -> (AvailabilityService, Uuid) {
    let store = Arc::new(MemoryStore::new());
    let doctor_id = Uuid::new_v4();
    store
        .register_doctor(DoctorSchedule {
            id: doctor_id,
            working_hours: hours,
        })
        .await;
    for apt in existing {
        let mut apt = apt;
        apt.doctor_id = doctor_id;
        store.create(apt).await.unwrap();
    }
    let service = AvailabilityService::new(store.clone(), store);
    (service, doctor_id)
}

#[tokio::test]
async fn single_booking_blocks_exactly_one_of_sixteen_slots() {
    // 09:00-17:00 at 30 minutes gives 16 slots; one confirmed booking at
    // 10:00-10:30 removes exactly that slot.
    let (service, doctor_id) = setup(
        nine_to_five(),
        vec![appointment(
            Uuid::nil(),
            at(10, 0),
            30,
            AppointmentStatus::Confirmed,
        )],
    )
    .await;

    let day = service
        .compute_availability(doctor_id, day(), Some(30))
        .await
        .unwrap();

    assert_eq!(day.booked_ranges.len(), 1);
    assert_eq!(day.free_slots.len(), 15);
    assert!(!day
        .free_slots
        .iter()
        .any(|slot| slot.start == at(10, 0)));
    assert!(day.free_slots.iter().any(|slot| slot.start == at(9, 30)));
    assert!(day.free_slots.iter().any(|slot| slot.start == at(10, 30)));
}

#[tokio::test]
async fn empty_day_yields_full_grid_of_slots() {
    let (service, doctor_id) = setup(nine_to_five(), vec![]).await;

    let day = service
        .compute_availability(doctor_id, day(), Some(30))
        .await
        .unwrap();

    assert_eq!(day.free_slots.len(), 16);
    assert_eq!(day.free_slots.first().unwrap().start, at(9, 0));
    assert_eq!(day.free_slots.last().unwrap().end, at(17, 0));
}

#[tokio::test]
async fn slots_are_exact_sorted_disjoint_and_avoid_bookings() {
    let (service, doctor_id) = setup(
        nine_to_five(),
        vec![
            appointment(Uuid::nil(), at(10, 0), 45, AppointmentStatus::Confirmed),
            appointment(Uuid::nil(), at(13, 15), 30, AppointmentStatus::Pending),
        ],
    )
    .await;

    let day = service
        .compute_availability(doctor_id, day(), Some(30))
        .await
        .unwrap();

    for slot in &day.free_slots {
        assert_eq!(slot.duration_minutes(), 30);
        for booked in &day.booked_ranges {
            assert!(!slot.overlaps(booked), "slot {:?} overlaps booking {:?}", slot, booked);
        }
    }
    for pair in day.free_slots.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
}

#[tokio::test]
async fn overlapping_bookings_are_merged_before_subtraction() {
    let (service, doctor_id) = setup(
        nine_to_five(),
        vec![
            appointment(Uuid::nil(), at(10, 0), 60, AppointmentStatus::Confirmed),
            appointment(Uuid::nil(), at(10, 30), 60, AppointmentStatus::Confirmed),
        ],
    )
    .await;

    let day = service
        .compute_availability(doctor_id, day(), Some(30))
        .await
        .unwrap();

    // Busy 10:00-11:30; 09:00-10:00 and 11:30-17:00 remain.
    assert_eq!(day.booked_ranges.len(), 2);
    assert_eq!(day.free_slots.len(), 2 + 11);
    assert!(!day.free_slots.iter().any(|slot| slot.start >= at(10, 0) && slot.start < at(11, 30)));
}

#[tokio::test]
async fn cancelled_bookings_free_their_slot() {
    let (service, doctor_id) = setup(
        nine_to_five(),
        vec![appointment(
            Uuid::nil(),
            at(10, 0),
            30,
            AppointmentStatus::Cancelled,
        )],
    )
    .await;

    let day = service
        .compute_availability(doctor_id, day(), Some(30))
        .await
        .unwrap();

    assert!(day.booked_ranges.is_empty());
    assert_eq!(day.free_slots.len(), 16);
}

#[tokio::test]
async fn booking_straddling_working_start_masks_the_overlap() {
    // 08:30-09:30 eats the first half hour of the working window.
    let (service, doctor_id) = setup(
        nine_to_five(),
        vec![appointment(
            Uuid::nil(),
            at(8, 30),
            60,
            AppointmentStatus::Confirmed,
        )],
    )
    .await;

    let day = service
        .compute_availability(doctor_id, day(), Some(30))
        .await
        .unwrap();

    assert_eq!(day.free_slots.first().unwrap().start, at(9, 30));
    assert_eq!(day.free_slots.len(), 15);
}

#[tokio::test]
async fn default_granularity_is_thirty_minutes() {
    let (service, doctor_id) = setup(nine_to_five(), vec![]).await;

    let day = service
        .compute_availability(doctor_id, day(), None)
        .await
        .unwrap();

    assert!(day.free_slots.iter().all(|slot| slot.duration_minutes() == 30));
}

#[tokio::test]
async fn uneven_working_window_drops_trailing_remainder() {
    let hours = WorkingHours {
        day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        day_end: NaiveTime::from_hms_opt(10, 15, 0).unwrap(),
    };
    let (service, doctor_id) = setup(hours, vec![]).await;

    let day = service
        .compute_availability(doctor_id, day(), Some(30))
        .await
        .unwrap();

    // 09:00-10:15 holds two full 30-minute slots; the last 15 are dropped.
    assert_eq!(day.free_slots.len(), 2);
    assert_eq!(day.free_slots.last().unwrap().end, at(10, 0));
}

#[tokio::test]
async fn unknown_doctor_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let service = AvailabilityService::new(store.clone(), store);

    let result = service
        .compute_availability(Uuid::new_v4(), day(), Some(30))
        .await;

    assert_matches!(result, Err(SchedulingError::DoctorNotFound));
}

#[tokio::test]
async fn out_of_range_granularity_is_rejected() {
    let (service, doctor_id) = setup(nine_to_five(), vec![]).await;

    assert_matches!(
        service.compute_availability(doctor_id, day(), Some(0)).await,
        Err(SchedulingError::Validation(_))
    );
    assert_matches!(
        service.compute_availability(doctor_id, day(), Some(500)).await,
        Err(SchedulingError::Validation(_))
    );
}
