// libs/scheduling-cell/src/store/mod.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentFilter, DoctorSchedule, SchedulingError};

pub mod memory;
pub mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

/// Persistence expected by the engine. `create`/`update` must be atomic:
/// a failed write leaves no partial record. Safe concurrent booking
/// additionally requires the advisory doctor lock to be honored across
/// the engine's check-then-write sequence; a store without it is unsafe
/// under concurrent load.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, SchedulingError>;

    /// Replaces the stored record wholesale. AppointmentNotFound if absent.
    async fn update(&self, appointment: Appointment) -> Result<Appointment, SchedulingError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError>;

    /// Appointments of one doctor whose start lies in `[from, to]`,
    /// ascending by start time. Status filtering is the caller's concern.
    async fn find_by_doctor_in_range(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    async fn find(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError>;

    /// Try to take the per-doctor advisory lock. `false` means another
    /// booking currently holds it; the caller may retry.
    async fn acquire_doctor_lock(&self, doctor_id: Uuid) -> Result<bool, SchedulingError>;

    async fn release_doctor_lock(&self, doctor_id: Uuid) -> Result<(), SchedulingError>;
}

/// External patient registry; the engine only needs existence.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError>;
}

/// External doctor registry with the working-hours view.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn get(&self, doctor_id: Uuid) -> Result<Option<DoctorSchedule>, SchedulingError>;
}
