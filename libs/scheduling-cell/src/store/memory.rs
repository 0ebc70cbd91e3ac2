// libs/scheduling-cell/src/store/memory.rs
//
// In-process store used in tests and as the reference implementation of
// the store contract, including the advisory doctor lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentFilter, DoctorSchedule, SchedulingError};
use crate::store::{AppointmentStore, DoctorDirectory, PatientDirectory};

#[derive(Default)]
pub struct MemoryStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    doctors: RwLock<HashMap<Uuid, DoctorSchedule>>,
    patients: RwLock<HashSet<Uuid>>,
    doctor_locks: Mutex<HashSet<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_doctor(&self, schedule: DoctorSchedule) {
        self.doctors.write().await.insert(schedule.id, schedule);
    }

    pub async fn register_patient(&self, patient_id: Uuid) {
        self.patients.write().await.insert(patient_id);
    }

    /// Snapshot of every stored appointment, unordered. Test helper.
    pub async fn all_appointments(&self) -> Vec<Appointment> {
        self.appointments.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&appointment.id) {
            return Err(SchedulingError::Database(format!(
                "Appointment {} already exists",
                appointment.id
            )));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(appointment)
            }
            None => Err(SchedulingError::AppointmentNotFound),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_by_doctor_in_range(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.read().await;
        let mut matched: Vec<Appointment> = appointments
            .values()
            .filter(|apt| {
                apt.doctor_id == doctor_id && apt.start_time >= from && apt.start_time <= to
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(matched)
    }

    async fn find(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.read().await;
        let mut matched: Vec<Appointment> = appointments
            .values()
            .filter(|apt| {
                filter.patient_id.map_or(true, |id| apt.patient_id == id)
                    && filter.doctor_id.map_or(true, |id| apt.doctor_id == id)
                    && filter.status.map_or(true, |status| apt.status == status)
                    && filter.from_date.map_or(true, |from| apt.start_time >= from)
                    && filter.to_date.map_or(true, |to| apt.start_time <= to)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(matched)
    }

    async fn acquire_doctor_lock(&self, doctor_id: Uuid) -> Result<bool, SchedulingError> {
        let acquired = self.doctor_locks.lock().await.insert(doctor_id);
        if acquired {
            debug!("Doctor lock acquired: {}", doctor_id);
        }
        Ok(acquired)
    }

    async fn release_doctor_lock(&self, doctor_id: Uuid) -> Result<(), SchedulingError> {
        self.doctor_locks.lock().await.remove(&doctor_id);
        debug!("Doctor lock released: {}", doctor_id);
        Ok(())
    }
}

#[async_trait]
impl PatientDirectory for MemoryStore {
    async fn exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError> {
        Ok(self.patients.read().await.contains(&patient_id))
    }
}

#[async_trait]
impl DoctorDirectory for MemoryStore {
    async fn get(&self, doctor_id: Uuid) -> Result<Option<DoctorSchedule>, SchedulingError> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }
}
