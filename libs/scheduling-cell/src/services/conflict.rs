// libs/scheduling-cell/src/services/conflict.rs
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::interval::TimeRange;
use crate::models::{Appointment, SchedulingError, MAX_DURATION_MINUTES};
use crate::store::AppointmentStore;

pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Check whether a candidate interval collides with any of the
    /// doctor's active appointments. Returns the earliest conflicting
    /// appointment, or None when the slot is free.
    ///
    /// `exclude_appointment_id` skips one appointment, so a reschedule is
    /// never blocked by its own prior interval.
    pub async fn check_conflict(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        duration_minutes: i32,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let candidate = TimeRange::from_start_duration(start_time, duration_minutes)?;

        debug!(
            "Checking conflicts for doctor {} from {} to {}",
            doctor_id, candidate.start, candidate.end
        );

        // Any appointment able to overlap the candidate must start within
        // one maximum appointment length of it, on either side.
        let window = Duration::minutes(MAX_DURATION_MINUTES as i64);
        let existing = self
            .store
            .find_by_doctor_in_range(doctor_id, candidate.start - window, candidate.end + window)
            .await?;

        // Store results come back ascending by start, so the first hit is
        // the earliest conflict.
        let conflict = existing.into_iter().find(|appointment| {
            appointment.status.is_active()
                && Some(appointment.id) != exclude_appointment_id
                && appointment.interval().overlaps(&candidate)
        });

        if let Some(ref appointment) = conflict {
            warn!(
                "Conflict detected for doctor {} - candidate {} overlaps appointment {}",
                doctor_id, candidate.start, appointment.id
            );
        }

        Ok(conflict)
    }
}
