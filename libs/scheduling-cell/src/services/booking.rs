// libs/scheduling-cell/src/services/booking.rs
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentStatus,
    BookAppointmentRequest, DayAvailability, SchedulingError,
};
use crate::services::availability::AvailabilityService;
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::store::{AppointmentStore, DoctorDirectory, PatientDirectory};

const MAX_LOCK_ATTEMPTS: u32 = 3;
const LOCK_RETRY_BASE_MS: u64 = 100;

/// The engine's entry point: race-safe booking, rescheduling and
/// cancellation plus availability reads, composed from the conflict
/// detector, the lifecycle state machine and the store.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientDirectory>,
    conflict_service: ConflictDetectionService,
    availability_service: AvailabilityService,
    lifecycle_service: AppointmentLifecycleService,
    doctors: Arc<dyn DoctorDirectory>,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientDirectory>,
        doctors: Arc<dyn DoctorDirectory>,
    ) -> Self {
        let conflict_service = ConflictDetectionService::new(Arc::clone(&store));
        let availability_service =
            AvailabilityService::new(Arc::clone(&store), Arc::clone(&doctors));

        Self {
            store,
            patients,
            conflict_service,
            availability_service,
            lifecycle_service: AppointmentLifecycleService::new(),
            doctors,
        }
    }

    /// Book a new appointment. Persists a Pending record when the
    /// requested interval is free; the whole check-then-write runs under
    /// the doctor's advisory lock so concurrent bookings cannot both pass
    /// the conflict check.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Booking appointment for patient {} with doctor {} at {}",
            request.patient_id, request.doctor_id, request.start_time
        );

        self.lifecycle_service.validate_duration(request.duration_minutes)?;
        self.lifecycle_service.validate_notes(request.notes.as_deref())?;

        if !self.patients.exists(request.patient_id).await? {
            return Err(SchedulingError::PatientNotFound);
        }
        if self.doctors.get(request.doctor_id).await?.is_none() {
            return Err(SchedulingError::DoctorNotFound);
        }

        self.acquire_doctor_lock(request.doctor_id).await?;
        let result = self.create_under_lock(&request).await;
        self.release_doctor_lock(request.doctor_id).await;

        if let Ok(ref appointment) = result {
            info!("Appointment {} booked with doctor {}", appointment.id, request.doctor_id);
        }
        result
    }

    /// Apply a partial update. The record is re-read and validated under
    /// the doctor lock so the write never pushes a stale snapshot over a
    /// concurrent cancel; a changed start or duration additionally reruns
    /// conflict detection (excluding this appointment's own interval).
    /// All patched fields land in a single store write.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Updating appointment: {}", appointment_id);

        if let Some(duration) = patch.duration_minutes {
            self.lifecycle_service.validate_duration(duration)?;
        }
        self.lifecycle_service.validate_notes(patch.notes.as_deref())?;

        // Only the doctor id is taken from this read; everything
        // state-dependent is re-checked against a fresh read under the lock.
        let doctor_id = self.get_appointment(appointment_id).await?.doctor_id;

        self.acquire_doctor_lock(doctor_id).await?;
        let result = self.update_under_lock(appointment_id, &patch).await;
        self.release_doctor_lock(doctor_id).await;

        if let Ok(ref appointment) = result {
            info!(
                "Appointment {} updated (start {})",
                appointment.id, appointment.start_time
            );
        }
        result
    }

    /// Soft cancel: flips status to Cancelled, never deletes the record.
    /// Re-cancelling a cancelled appointment is a success no-op; Completed
    /// appointments are immutable. Runs under the doctor lock so it
    /// serializes with updates and bookings for the same doctor.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let doctor_id = self.get_appointment(appointment_id).await?.doctor_id;

        self.acquire_doctor_lock(doctor_id).await?;
        let result = self.cancel_under_lock(appointment_id).await;
        self.release_doctor_lock(doctor_id).await;
        result
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        self.store
            .find_by_id(appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)
    }

    /// Appointments matching the filter, ascending by start time.
    pub async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Searching appointments with filters: {:?}", filter);
        self.store.find(&filter).await
    }

    /// Free/busy picture for a doctor's calendar day. Best-effort with
    /// respect to concurrent writes; booking re-validates every slot.
    pub async fn check_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        granularity_minutes: Option<i32>,
    ) -> Result<DayAvailability, SchedulingError> {
        self.availability_service
            .compute_availability(doctor_id, date, granularity_minutes)
            .await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn create_under_lock(
        &self,
        request: &BookAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        if let Some(conflicting) = self
            .conflict_service
            .check_conflict(
                request.doctor_id,
                request.start_time,
                request.duration_minutes,
                None,
            )
            .await?
        {
            return Err(SchedulingError::conflict_with(&conflicting));
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            start_time: request.start_time,
            duration_minutes: request.duration_minutes,
            status: AppointmentStatus::Pending,
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        self.store.create(appointment).await
    }

    async fn update_under_lock(
        &self,
        appointment_id: Uuid,
        patch: &AppointmentPatch,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get_appointment(appointment_id).await?;

        if current.status == AppointmentStatus::Completed {
            return Err(SchedulingError::Validation(
                "Completed appointments cannot be modified".to_string(),
            ));
        }

        if let Some(new_status) = patch.status {
            if new_status != current.status {
                self.lifecycle_service
                    .validate_status_transition(current.status, new_status)?;
            }
        }

        if patch.reschedules() {
            if !current.status.is_active() {
                return Err(SchedulingError::Validation(format!(
                    "Only pending or confirmed appointments can be rescheduled (current status: {})",
                    current.status
                )));
            }

            let new_start = patch.start_time.unwrap_or(current.start_time);
            let new_duration = patch.duration_minutes.unwrap_or(current.duration_minutes);

            if let Some(conflicting) = self
                .conflict_service
                .check_conflict(current.doctor_id, new_start, new_duration, Some(current.id))
                .await?
            {
                return Err(SchedulingError::conflict_with(&conflicting));
            }
        }

        self.store.update(Self::apply_patch(&current, patch)).await
    }

    async fn cancel_under_lock(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get_appointment(appointment_id).await?;

        match current.status {
            AppointmentStatus::Completed => Err(SchedulingError::Validation(
                "Completed appointments cannot be cancelled".to_string(),
            )),
            AppointmentStatus::Cancelled => Ok(current),
            _ => {
                let mut cancelled = current;
                cancelled.status = AppointmentStatus::Cancelled;
                cancelled.updated_at = Utc::now();
                let cancelled = self.store.update(cancelled).await?;
                info!("Appointment {} cancelled", cancelled.id);
                Ok(cancelled)
            }
        }
    }

    fn apply_patch(current: &Appointment, patch: &AppointmentPatch) -> Appointment {
        let mut updated = current.clone();
        if let Some(start_time) = patch.start_time {
            updated.start_time = start_time;
        }
        if let Some(duration) = patch.duration_minutes {
            updated.duration_minutes = duration;
        }
        if let Some(status) = patch.status {
            updated.status = status;
        }
        if let Some(ref notes) = patch.notes {
            updated.notes = Some(notes.clone());
        }
        updated.updated_at = Utc::now();
        updated
    }

    /// Take the per-doctor advisory lock, retrying with linear backoff.
    /// Exhausting the attempts surfaces as a retryable Concurrency error.
    async fn acquire_doctor_lock(&self, doctor_id: Uuid) -> Result<(), SchedulingError> {
        for attempt in 1..=MAX_LOCK_ATTEMPTS {
            if self.store.acquire_doctor_lock(doctor_id).await? {
                return Ok(());
            }
            debug!(
                "Doctor {} lock busy, attempt {}/{}",
                doctor_id, attempt, MAX_LOCK_ATTEMPTS
            );
            if attempt < MAX_LOCK_ATTEMPTS {
                tokio::time::sleep(std::time::Duration::from_millis(
                    LOCK_RETRY_BASE_MS * attempt as u64,
                ))
                .await;
            }
        }

        Err(SchedulingError::Concurrency(format!(
            "Could not acquire scheduling lock for doctor {} after {} attempts",
            doctor_id, MAX_LOCK_ATTEMPTS
        )))
    }

    async fn release_doctor_lock(&self, doctor_id: Uuid) {
        // Release failures are logged, not propagated: the stored lock
        // carries an expiry, so a stuck row clears itself.
        if let Err(e) = self.store.release_doctor_lock(doctor_id).await {
            warn!("Failed to release scheduling lock for doctor {}: {}", doctor_id, e);
        }
    }
}
