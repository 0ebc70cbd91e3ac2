// libs/scheduling-cell/src/services/availability.rs
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::interval::{self, TimeRange};
use crate::models::{
    DayAvailability, SchedulingError, DEFAULT_SLOT_MINUTES, MAX_DURATION_MINUTES,
};
use crate::store::{AppointmentStore, DoctorDirectory};

/// Smallest slot granularity the calculator will quantize to.
const MIN_SLOT_MINUTES: i32 = 5;

pub struct AvailabilityService {
    store: Arc<dyn AppointmentStore>,
    doctors: Arc<dyn DoctorDirectory>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn AppointmentStore>, doctors: Arc<dyn DoctorDirectory>) -> Self {
        Self { store, doctors }
    }

    /// Free/busy picture for one doctor on one calendar day.
    ///
    /// Booked ranges are the doctor's active appointments starting that
    /// day, ascending. Free slots come from gap-merge: coalesce the booked
    /// ranges, subtract them from the working-hours window, and cut each
    /// gap into granularity-sized slots, dropping short remainders.
    pub async fn compute_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        granularity_minutes: Option<i32>,
    ) -> Result<DayAvailability, SchedulingError> {
        let granularity = granularity_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
        if !(MIN_SLOT_MINUTES..=MAX_DURATION_MINUTES).contains(&granularity) {
            return Err(SchedulingError::Validation(format!(
                "Slot granularity must be between {} and {} minutes",
                MIN_SLOT_MINUTES, MAX_DURATION_MINUTES
            )));
        }

        let doctor = self
            .doctors
            .get(doctor_id)
            .await?
            .ok_or(SchedulingError::DoctorNotFound)?;

        debug!("Calculating availability for doctor {} on {}", doctor_id, date);

        let day_start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let day_end = date.and_hms_opt(23, 59, 59).unwrap().and_utc();

        let appointments = self
            .store
            .find_by_doctor_in_range(doctor_id, day_start, day_end)
            .await?;

        let booked_ranges: Vec<TimeRange> = appointments
            .iter()
            .filter(|apt| apt.status.is_active())
            .map(|apt| apt.interval())
            .collect();

        let hours = doctor.working_hours;
        let working_window = TimeRange::new(
            date.and_time(hours.day_start).and_utc(),
            date.and_time(hours.day_end).and_utc(),
        )?;

        let busy = interval::merge_ranges(booked_ranges.clone());
        let free_slots: Vec<TimeRange> = interval::subtract_ranges(working_window, &busy)
            .into_iter()
            .flat_map(|gap| interval::quantize(gap, granularity))
            .collect();

        debug!(
            "Doctor {} on {}: {} booked ranges, {} free slots",
            doctor_id,
            date,
            booked_ranges.len(),
            free_slots.len()
        );

        Ok(DayAvailability {
            doctor_id,
            date,
            working_hours: hours,
            booked_ranges,
            free_slots,
        })
    }
}
