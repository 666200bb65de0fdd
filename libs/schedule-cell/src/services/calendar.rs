use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tracing::debug;
use uuid::Uuid;

use crate::models::{day_of_week, OrganizationBlock, ScheduleError, WorkShift};
use crate::services::interval::{normalize, TimeRange};

/// Read-only view over employee schedules and organization blocks, owned by
/// tenant administration outside this cell.
#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    async fn employee_exists(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
    ) -> Result<bool, ScheduleError>;

    async fn shifts_for(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<WorkShift>, ScheduleError>;

    async fn blocks_for(
        &self,
        organization_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<OrganizationBlock>, ScheduleError>;
}

/// Turns a weekly recurring schedule plus organization-wide blocks into the
/// open intervals of one concrete date.
pub struct WorkCalendarResolver {
    schedules: Arc<dyn ScheduleProvider>,
}

impl WorkCalendarResolver {
    pub fn new(schedules: Arc<dyn ScheduleProvider>) -> Self {
        Self { schedules }
    }

    pub async fn open_intervals(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TimeRange>, ScheduleError> {
        if !self
            .schedules
            .employee_exists(organization_id, employee_id)
            .await?
        {
            return Err(ScheduleError::EmployeeNotFound);
        }

        // Blocks are whole-day: one active block covering the date wipes it.
        let blocks = self.schedules.blocks_for(organization_id, date).await?;
        if blocks.iter().any(|block| block.covers(date)) {
            debug!(
                "Organization {} blocked on {}, no open intervals",
                organization_id, date
            );
            return Ok(vec![]);
        }

        let shifts = self
            .schedules
            .shifts_for(organization_id, employee_id, day_of_week(date.weekday()))
            .await?;

        let intervals = shifts
            .iter()
            .filter(|shift| shift.active && shift.start_time < shift.end_time)
            .filter_map(|shift| {
                TimeRange::new(
                    date.and_time(shift.start_time).and_utc(),
                    date.and_time(shift.end_time).and_utc(),
                )
            })
            .collect();

        Ok(normalize(intervals))
    }
}
