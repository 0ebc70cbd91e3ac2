// libs/scheduling-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{
    AppointmentStatus, SchedulingError, MAX_DURATION_MINUTES, MAX_NOTES_CHARS,
    MIN_DURATION_MINUTES,
};

/// State machine guarding appointment status changes and the shared input
/// invariants. Completed is terminal and only ever set by the external
/// elapsed-time process through an update; this engine never produces it
/// on its own.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        debug!("Validating status transition {} -> {}", current_status, new_status);

        if !self.valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(SchedulingError::Validation(format!(
                "Invalid status transition: {} -> {}",
                current_status, new_status
            )));
        }

        Ok(())
    }

    /// All statuses reachable from the given one.
    pub fn valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Cancelled,
                AppointmentStatus::Completed,
            ],
            // Re-cancelling is an idempotent no-op.
            AppointmentStatus::Cancelled => vec![AppointmentStatus::Cancelled],
            // Terminal and immutable.
            AppointmentStatus::Completed => vec![],
        }
    }

    pub fn validate_duration(&self, duration_minutes: i32) -> Result<(), SchedulingError> {
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
            return Err(SchedulingError::Validation(format!(
                "Duration must be between {} and {} minutes",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            )));
        }
        Ok(())
    }

    pub fn validate_notes(&self, notes: Option<&str>) -> Result<(), SchedulingError> {
        if let Some(notes) = notes {
            if notes.chars().count() > MAX_NOTES_CHARS {
                return Err(SchedulingError::Validation(format!(
                    "Notes must not exceed {} characters",
                    MAX_NOTES_CHARS
                )));
            }
        }
        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
