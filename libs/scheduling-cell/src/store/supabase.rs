// libs/scheduling-cell/src/store/supabase.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentFilter, DoctorSchedule, SchedulingError, WorkingHours,
};
use crate::store::{AppointmentStore, DoctorDirectory, PatientDirectory};

/// How long a scheduling lock row stays valid before any process may
/// reclaim it. Covers a crashed booking that never released its lock.
const LOCK_TIMEOUT_SECONDS: i64 = 30;

/// Store adapter over Supabase's PostgREST API. The advisory doctor lock
/// is a uniquely keyed row in `scheduling_locks`: the insert succeeds for
/// exactly one contender, everyone else backs off.
pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
    service_token: String,
}

#[derive(Debug, Deserialize)]
struct DoctorRow {
    id: Uuid,
    day_start: chrono::NaiveTime,
    day_end: chrono::NaiveTime,
}

impl SupabaseStore {
    pub fn new(supabase: Arc<SupabaseClient>, service_token: impl Into<String>) -> Self {
        Self {
            supabase,
            service_token: service_token.into(),
        }
    }

    fn lock_key(doctor_id: Uuid) -> String {
        format!("doctor_{}", doctor_id)
    }

    async fn get_rows(&self, path: &str) -> Result<Vec<Value>, SchedulingError> {
        self.supabase
            .request(Method::GET, path, Some(&self.service_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))
    }

    fn parse_appointments(rows: Vec<Value>) -> Result<Vec<Appointment>, SchedulingError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                SchedulingError::Database(format!("Failed to parse appointments: {}", e))
            })
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        headers
    }

    async fn try_insert_lock(&self, doctor_id: Uuid) -> bool {
        let lock_data = json!({
            "lock_key": Self::lock_key(doctor_id),
            "doctor_id": doctor_id,
            "acquired_at": Utc::now().to_rfc3339(),
            "expires_at": (Utc::now() + Duration::seconds(LOCK_TIMEOUT_SECONDS)).to_rfc3339(),
        });

        self.supabase
            .request::<Value>(
                Method::POST,
                "/rest/v1/scheduling_locks",
                Some(&self.service_token),
                Some(lock_data),
            )
            .await
            .is_ok()
    }

    /// Remove the lock row if its expiry has passed. Returns true when a
    /// stale lock was cleared and acquisition is worth retrying.
    async fn cleanup_expired_lock(&self, doctor_id: Uuid) -> Result<bool, SchedulingError> {
        let path = format!(
            "/rest/v1/scheduling_locks?lock_key=eq.{}&select=expires_at",
            Self::lock_key(doctor_id)
        );
        let rows = self.get_rows(&path).await?;

        let Some(expires_at_str) = rows
            .first()
            .and_then(|lock| lock.get("expires_at"))
            .and_then(|v| v.as_str())
        else {
            // Lock row vanished between insert failure and this check.
            return Ok(true);
        };

        match DateTime::parse_from_rfc3339(expires_at_str) {
            Ok(expires_at) if expires_at.with_timezone(&Utc) < Utc::now() => {
                self.release_doctor_lock(doctor_id).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseStore {
    async fn create(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(&self.service_token),
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e))),
            None => Err(SchedulingError::Database(
                "Appointment creation returned no record".to_string(),
            )),
        }
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = serde_json::to_value(&appointment)
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.service_token),
                Some(body),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e))),
            None => Err(SchedulingError::AppointmentNotFound),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self.get_rows(&path).await?;
        Ok(Self::parse_appointments(rows)?.into_iter().next())
    }

    async fn find_by_doctor_in_range(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&start_time=gte.{}&start_time=lte.{}&order=start_time.asc",
            doctor_id,
            urlencoding::encode(&from.to_rfc3339()),
            urlencoding::encode(&to.to_rfc3339()),
        );
        let rows = self.get_rows(&path).await?;
        Self::parse_appointments(rows)
    }

    async fn find(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = Vec::new();

        if let Some(patient_id) = filter.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = filter.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = filter.from_date {
            query_parts.push(format!(
                "start_time=gte.{}",
                urlencoding::encode(&from_date.to_rfc3339())
            ));
        }
        if let Some(to_date) = filter.to_date {
            query_parts.push(format!(
                "start_time=lte.{}",
                urlencoding::encode(&to_date.to_rfc3339())
            ));
        }

        query_parts.push("order=start_time.asc".to_string());
        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        debug!("Searching appointments: {}", path);
        let rows = self.get_rows(&path).await?;
        Self::parse_appointments(rows)
    }

    async fn acquire_doctor_lock(&self, doctor_id: Uuid) -> Result<bool, SchedulingError> {
        if self.try_insert_lock(doctor_id).await {
            debug!("Scheduling lock acquired for doctor {}", doctor_id);
            return Ok(true);
        }

        // Insert rejected: a lock row exists. Reclaim it only if expired.
        if self.cleanup_expired_lock(doctor_id).await? {
            return Ok(self.try_insert_lock(doctor_id).await);
        }

        Ok(false)
    }

    async fn release_doctor_lock(&self, doctor_id: Uuid) -> Result<(), SchedulingError> {
        let path = format!(
            "/rest/v1/scheduling_locks?lock_key=eq.{}",
            Self::lock_key(doctor_id)
        );
        let _: Value = self
            .supabase
            .request(Method::DELETE, &path, Some(&self.service_token), None)
            .await
            .map_err(|e| SchedulingError::Database(format!("Lock release failed: {}", e)))?;

        debug!("Scheduling lock released for doctor {}", doctor_id);
        Ok(())
    }
}

#[async_trait]
impl PatientDirectory for SupabaseStore {
    async fn exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id", patient_id);
        let rows = self.get_rows(&path).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseStore {
    async fn get(&self, doctor_id: Uuid) -> Result<Option<DoctorSchedule>, SchedulingError> {
        let path = format!(
            "/rest/v1/doctors?id=eq.{}&select=id,day_start,day_end",
            doctor_id
        );
        let rows = self.get_rows(&path).await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let doctor: DoctorRow = serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse doctor: {}", e)))?;

        Ok(Some(DoctorSchedule {
            id: doctor.id,
            working_hours: WorkingHours {
                day_start: doctor.day_start,
                day_end: doctor.day_end,
            },
        }))
    }
}
