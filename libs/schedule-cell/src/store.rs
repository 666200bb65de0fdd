use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use shared_database::rest::RestStore;

use crate::models::{OrganizationBlock, ScheduleError, ServiceDuration, WorkShift};
use crate::services::availability::ServiceDirectory;
use crate::services::calendar::ScheduleProvider;

// ==============================================================================
// REST-BACKED PROVIDER
// ==============================================================================

pub struct RestScheduleStore {
    store: Arc<RestStore>,
}

impl RestScheduleStore {
    pub fn new(store: Arc<RestStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ScheduleProvider for RestScheduleStore {
    async fn employee_exists(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
    ) -> Result<bool, ScheduleError> {
        let path = format!(
            "/rest/v1/employees?id=eq.{}&organization_id=eq.{}&select=id",
            employee_id, organization_id
        );
        let rows: Vec<Value> = self.store.request(Method::GET, &path, None).await?;
        Ok(!rows.is_empty())
    }

    async fn shifts_for(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<WorkShift>, ScheduleError> {
        let path = format!(
            "/rest/v1/work_schedules?organization_id=eq.{}&employee_id=eq.{}&day_of_week=eq.{}&active=eq.true&order=start_time.asc",
            organization_id, employee_id, day_of_week
        );
        let shifts: Vec<WorkShift> = self.store.request(Method::GET, &path, None).await?;
        Ok(shifts)
    }

    async fn blocks_for(
        &self,
        organization_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<OrganizationBlock>, ScheduleError> {
        let path = format!(
            "/rest/v1/organization_blocks?organization_id=eq.{}&active=eq.true&starts_on=lte.{}&ends_on=gte.{}",
            organization_id, date, date
        );
        let blocks: Vec<OrganizationBlock> = self.store.request(Method::GET, &path, None).await?;
        Ok(blocks)
    }
}

#[async_trait]
impl ServiceDirectory for RestScheduleStore {
    async fn total_duration_minutes(
        &self,
        organization_id: Uuid,
        service_ids: &[Uuid],
    ) -> Result<i64, ScheduleError> {
        let id_list = service_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/services?organization_id=eq.{}&id=in.({})&select=id,duration_minutes",
            organization_id, id_list
        );
        let rows: Vec<ServiceDuration> = self.store.request(Method::GET, &path, None).await?;

        let mut total = 0;
        for service_id in service_ids {
            let row = rows
                .iter()
                .find(|r| r.id == *service_id)
                .ok_or(ScheduleError::ServiceNotFound)?;
            total += row.duration_minutes;
        }
        Ok(total)
    }
}

// ==============================================================================
// IN-MEMORY PROVIDER
// ==============================================================================

/// In-memory schedule/catalog fixture used by tests and local runs.
#[derive(Default)]
pub struct MemoryScheduleStore {
    inner: Mutex<MemoryScheduleInner>,
}

#[derive(Default)]
struct MemoryScheduleInner {
    employees: Vec<(Uuid, Uuid)>,
    shifts: Vec<WorkShift>,
    blocks: Vec<OrganizationBlock>,
    services: HashMap<(Uuid, Uuid), i64>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_employee(&self, organization_id: Uuid, employee_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.employees.push((organization_id, employee_id));
    }

    pub fn add_shift(&self, shift: WorkShift) {
        let mut inner = self.inner.lock().unwrap();
        inner.shifts.push(shift);
    }

    pub fn add_block(&self, block: OrganizationBlock) {
        let mut inner = self.inner.lock().unwrap();
        inner.blocks.push(block);
    }

    pub fn add_service(&self, organization_id: Uuid, service_id: Uuid, duration_minutes: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .services
            .insert((organization_id, service_id), duration_minutes);
    }
}

#[async_trait]
impl ScheduleProvider for MemoryScheduleStore {
    async fn employee_exists(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
    ) -> Result<bool, ScheduleError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.employees.contains(&(organization_id, employee_id)))
    }

    async fn shifts_for(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<WorkShift>, ScheduleError> {
        let inner = self.inner.lock().unwrap();
        let mut shifts: Vec<WorkShift> = inner
            .shifts
            .iter()
            .filter(|s| {
                s.organization_id == organization_id
                    && s.employee_id == employee_id
                    && s.day_of_week == day_of_week
            })
            .cloned()
            .collect();
        shifts.sort_by_key(|s| s.start_time);
        Ok(shifts)
    }

    async fn blocks_for(
        &self,
        organization_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<OrganizationBlock>, ScheduleError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .blocks
            .iter()
            .filter(|b| b.organization_id == organization_id && b.covers(date))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ServiceDirectory for MemoryScheduleStore {
    async fn total_duration_minutes(
        &self,
        organization_id: Uuid,
        service_ids: &[Uuid],
    ) -> Result<i64, ScheduleError> {
        let inner = self.inner.lock().unwrap();
        let mut total = 0;
        for service_id in service_ids {
            total += inner
                .services
                .get(&(organization_id, *service_id))
                .ok_or(ScheduleError::ServiceNotFound)?;
        }
        Ok(total)
    }
}
