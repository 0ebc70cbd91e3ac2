// libs/scheduling-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime};
use std::fmt;

use crate::interval::TimeRange;

// ==============================================================================
// SCHEDULING LIMITS
// ==============================================================================

/// Shortest bookable appointment.
pub const MIN_DURATION_MINUTES: i32 = 15;
/// Longest bookable appointment; also sizes the conflict fetch window.
pub const MAX_DURATION_MINUTES: i32 = 240;
/// Upper bound on free-text notes attached to an appointment.
pub const MAX_NOTES_CHARS: usize = 500;
/// Slot size used by availability when the caller does not pass one.
pub const DEFAULT_SLOT_MINUTES: i32 = 30;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Scheduled end instant, exclusive.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + chrono::Duration::minutes(self.duration_minutes as i64)
    }

    /// The appointment's half-open occupancy window.
    pub fn interval(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Active appointments occupy the doctor's calendar and can conflict.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

// ==============================================================================
// DOCTOR SCHEDULE VIEW
// ==============================================================================

/// A doctor's bookable window for a day, owned by the external doctor
/// directory and read-only to this engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkingHours {
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: Uuid,
    pub working_hours: WorkingHours,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

/// Partial update applied atomically by `update_appointment`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentPatch {
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

impl AppointmentPatch {
    /// True when the patch moves or resizes the appointment's interval.
    pub fn reschedules(&self) -> bool {
        self.start_time.is_some() || self.duration_minutes.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

/// Free/busy picture for one doctor on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub working_hours: WorkingHours,
    pub booked_ranges: Vec<TimeRange>,
    pub free_slots: Vec<TimeRange>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Appointment conflicts with existing booking {appointment_id} ({start_time} - {end_time})")]
    Conflict {
        appointment_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },

    #[error("Concurrent booking failed: {0}")]
    Concurrency(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl SchedulingError {
    pub fn conflict_with(appointment: &Appointment) -> Self {
        SchedulingError::Conflict {
            appointment_id: appointment.id,
            start_time: appointment.start_time,
            end_time: appointment.end_time(),
        }
    }
}
