use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::json;
use uuid::Uuid;

use shared_database::rest::RestStore;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Persistence seam for appointments. `insert` and `reschedule` enforce the
/// per-employee overlap constraint at the storage boundary; that, not the
/// in-process validation, is what closes the check-then-act race between
/// concurrent bookings.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    async fn get(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError>;

    /// Compare-and-swap status update: applies only while the row is still
    /// in `from`.
    async fn update_status(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError>;

    async fn attach_charges(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        charge_ids: Vec<Uuid>,
    ) -> Result<Appointment, AppointmentError>;

    /// Atomically mark the original Rescheduled (with a back-reference) and
    /// insert its replacement, subject to the same overlap constraint with
    /// the original's own range excluded.
    async fn reschedule(
        &self,
        organization_id: Uuid,
        original_id: Uuid,
        replacement: Appointment,
    ) -> Result<Appointment, AppointmentError>;

    async fn list_for_customer(
        &self,
        organization_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_for_employee_on(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError>;
}

// ==============================================================================
// REST-BACKED STORE
// ==============================================================================

/// PostgREST-backed store. The appointments table carries an exclusion
/// constraint over (employee, time range) for calendar-blocking statuses;
/// violations surface as 409 and are mapped to SlotUnavailable.
pub struct RestAppointmentStore {
    store: Arc<RestStore>,
}

impl RestAppointmentStore {
    pub fn new(store: Arc<RestStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AppointmentStore for RestAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let row = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::Storage(e.to_string()))?;
        let stored: Appointment = self.store.insert_returning("appointments", row).await?;
        Ok(stored)
    }

    async fn get(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&organization_id=eq.{}",
            appointment_id, organization_id
        );
        let rows: Vec<Appointment> = self.store.request(Method::GET, &path, None).await?;
        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn update_status(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&organization_id=eq.{}&status=eq.{}",
            appointment_id, organization_id, from
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let body = json!({
            "status": to,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self
            .store
            .request_with_headers(Method::PATCH, &path, Some(body), Some(headers))
            .await?;

        rows.into_iter().next().ok_or_else(|| {
            AppointmentError::Conflict("Appointment was modified concurrently".to_string())
        })
    }

    async fn attach_charges(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        charge_ids: Vec<Uuid>,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&organization_id=eq.{}",
            appointment_id, organization_id
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let body = json!({
            "charge_ids": charge_ids,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self
            .store
            .request_with_headers(Method::PATCH, &path, Some(body), Some(headers))
            .await?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn reschedule(
        &self,
        organization_id: Uuid,
        original_id: Uuid,
        replacement: Appointment,
    ) -> Result<Appointment, AppointmentError> {
        // Single RPC so the terminal mark and the replacement insert commit
        // together; the function re-checks the overlap constraint.
        let body = json!({
            "p_organization_id": organization_id,
            "p_original_id": original_id,
            "p_replacement": serde_json::to_value(&replacement)
                .map_err(|e| AppointmentError::Storage(e.to_string()))?,
        });
        let rows: Vec<Appointment> = self
            .store
            .request(Method::POST, "/rest/v1/rpc/reschedule_appointment", Some(body))
            .await?;
        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn list_for_customer(
        &self,
        organization_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?organization_id=eq.{}&customer_id=eq.{}&order=start_time.desc",
            organization_id, customer_id
        );
        let rows: Vec<Appointment> = self.store.request(Method::GET, &path, None).await?;
        Ok(rows)
    }

    async fn list_for_employee_on(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let start_of_day = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        let end_of_day = start_of_day + chrono::Duration::days(1);

        let path = format!(
            "/rest/v1/appointments?organization_id=eq.{}&employee_ids=cs.{{{}}}&start_time=gte.{}&start_time=lt.{}&order=start_time.asc",
            organization_id,
            employee_id,
            start_of_day.to_rfc3339(),
            end_of_day.to_rfc3339()
        );
        let rows: Vec<Appointment> = self.store.request(Method::GET, &path, None).await?;
        Ok(rows)
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// In-memory store used by tests and local runs. One mutex over the whole
/// table stands in for the database's exclusion constraint: every write
/// revalidates overlaps inside the critical section.
#[derive(Default)]
pub struct MemoryAppointmentStore {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlap check against every calendar-blocking appointment sharing an
    /// employee. Caller holds the lock.
    fn collides(
        table: &HashMap<Uuid, Appointment>,
        candidate: &Appointment,
        exclude: Option<Uuid>,
    ) -> bool {
        let Some(range) = candidate.time_range() else {
            return false;
        };
        table.values().any(|existing| {
            existing.id != candidate.id
                && Some(existing.id) != exclude
                && existing.organization_id == candidate.organization_id
                && existing.status.blocks_calendar()
                && existing
                    .employee_ids
                    .iter()
                    .any(|e| candidate.employee_ids.contains(e))
                && existing.time_range().is_some_and(|r| r.overlaps(&range))
        })
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut table = self.appointments.lock().unwrap();
        if appointment.status.blocks_calendar() && Self::collides(&table, &appointment, None) {
            return Err(AppointmentError::SlotUnavailable);
        }
        table.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let table = self.appointments.lock().unwrap();
        table
            .get(&appointment_id)
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .ok_or(AppointmentError::NotFound)
    }

    async fn update_status(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let mut table = self.appointments.lock().unwrap();
        let current = table
            .get(&appointment_id)
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .ok_or(AppointmentError::NotFound)?;

        if current.status != from {
            return Err(AppointmentError::Conflict(
                "Appointment was modified concurrently".to_string(),
            ));
        }

        // Entering a calendar-blocking status claims the slot, so the
        // constraint applies again (waitlist promotion).
        if to.blocks_calendar() && !from.blocks_calendar()
            && Self::collides(&table, &current, None)
        {
            return Err(AppointmentError::SlotUnavailable);
        }

        let appointment = table
            .get_mut(&appointment_id)
            .ok_or(AppointmentError::NotFound)?;
        appointment.status = to;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn attach_charges(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        charge_ids: Vec<Uuid>,
    ) -> Result<Appointment, AppointmentError> {
        let mut table = self.appointments.lock().unwrap();
        let appointment = table
            .get_mut(&appointment_id)
            .filter(|a| a.organization_id == organization_id)
            .ok_or(AppointmentError::NotFound)?;

        appointment.charge_ids = charge_ids;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn reschedule(
        &self,
        organization_id: Uuid,
        original_id: Uuid,
        replacement: Appointment,
    ) -> Result<Appointment, AppointmentError> {
        let mut table = self.appointments.lock().unwrap();

        let original = table
            .get(&original_id)
            .filter(|a| a.organization_id == organization_id)
            .ok_or(AppointmentError::NotFound)?;
        if original.status != AppointmentStatus::Scheduled {
            return Err(AppointmentError::Conflict(
                "Appointment was modified concurrently".to_string(),
            ));
        }

        if Self::collides(&table, &replacement, Some(original_id)) {
            return Err(AppointmentError::SlotUnavailable);
        }

        let now = Utc::now();
        if let Some(original) = table.get_mut(&original_id) {
            original.status = AppointmentStatus::Rescheduled;
            original.rescheduled_to = Some(replacement.id);
            original.updated_at = now;
        }
        table.insert(replacement.id, replacement.clone());
        Ok(replacement)
    }

    async fn list_for_customer(
        &self,
        organization_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let table = self.appointments.lock().unwrap();
        let mut rows: Vec<Appointment> = table
            .values()
            .filter(|a| a.organization_id == organization_id && a.customer_id == customer_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| std::cmp::Reverse(a.start_time));
        Ok(rows)
    }

    async fn list_for_employee_on(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let table = self.appointments.lock().unwrap();
        let mut rows: Vec<Appointment> = table
            .values()
            .filter(|a| {
                a.organization_id == organization_id
                    && a.employee_ids.contains(&employee_id)
                    && a.start_time.date_naive() == date
            })
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.start_time);
        Ok(rows)
    }
}
