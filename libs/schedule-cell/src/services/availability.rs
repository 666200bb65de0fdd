use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use crate::models::ScheduleError;
use crate::services::calendar::{ScheduleProvider, WorkCalendarResolver};
use crate::services::interval::{intersect_sets, subtract, FreeWindows, TimeRange};

/// Occupied time of one employee on one date, fed by the appointment store.
/// `exclude_appointment` lets a reschedule ignore the booking being moved.
#[async_trait]
pub trait BusySource: Send + Sync {
    async fn busy_intervals(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        date: NaiveDate,
        exclude_appointment: Option<Uuid>,
    ) -> Result<Vec<TimeRange>, ScheduleError>;
}

/// Service catalog as the scheduler sees it. Owned by the product catalog
/// outside this cell.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Sum of the durations of the given services, in minutes. Unknown ids
    /// fail with `ServiceNotFound`.
    async fn total_duration_minutes(
        &self,
        organization_id: Uuid,
        service_ids: &[Uuid],
    ) -> Result<i64, ScheduleError>;
}

pub struct AvailabilityService {
    calendar: WorkCalendarResolver,
    directory: Arc<dyn ServiceDirectory>,
    busy: Arc<dyn BusySource>,
    step: Duration,
}

impl AvailabilityService {
    pub fn new(
        schedules: Arc<dyn ScheduleProvider>,
        directory: Arc<dyn ServiceDirectory>,
        busy: Arc<dyn BusySource>,
        granularity_minutes: i64,
    ) -> Self {
        Self {
            calendar: WorkCalendarResolver::new(schedules),
            directory,
            busy,
            step: Duration::minutes(granularity_minutes.max(1)),
        }
    }

    /// Joint free windows for a booking: every listed employee must be open
    /// and unoccupied for the whole service block. The returned value walks
    /// candidate start times lazily, in ascending order.
    pub async fn free_windows(
        &self,
        organization_id: Uuid,
        employee_ids: &[Uuid],
        service_ids: &[Uuid],
        date: NaiveDate,
        preferred_window: Option<(NaiveTime, NaiveTime)>,
    ) -> Result<FreeWindows, ScheduleError> {
        self.free_windows_excluding(
            organization_id,
            employee_ids,
            service_ids,
            date,
            preferred_window,
            None,
        )
        .await
    }

    /// Same as [`free_windows`](Self::free_windows) but ignoring one
    /// existing appointment, used when that appointment is being moved.
    pub async fn free_windows_excluding(
        &self,
        organization_id: Uuid,
        employee_ids: &[Uuid],
        service_ids: &[Uuid],
        date: NaiveDate,
        preferred_window: Option<(NaiveTime, NaiveTime)>,
        exclude_appointment: Option<Uuid>,
    ) -> Result<FreeWindows, ScheduleError> {
        if employee_ids.is_empty() {
            return Err(ScheduleError::InvalidRequest(
                "At least one employee is required".to_string(),
            ));
        }
        if service_ids.is_empty() {
            return Err(ScheduleError::InvalidRequest(
                "At least one service is required".to_string(),
            ));
        }

        let duration_minutes = self
            .directory
            .total_duration_minutes(organization_id, service_ids)
            .await?;
        if duration_minutes <= 0 {
            return Err(ScheduleError::InvalidRequest(
                "Combined service duration must be positive".to_string(),
            ));
        }
        let duration = Duration::minutes(duration_minutes);

        let mut joint: Option<Vec<TimeRange>> = None;
        for employee_id in dedup(employee_ids) {
            let open = self
                .calendar
                .open_intervals(organization_id, employee_id, date)
                .await?;
            let busy = self
                .busy
                .busy_intervals(organization_id, employee_id, date, exclude_appointment)
                .await?;
            let free = subtract(open, &busy);

            joint = Some(match joint {
                Some(existing) => intersect_sets(&existing, &free),
                None => free,
            });

            // Joint availability can only shrink; stop early once empty.
            if joint.as_ref().is_some_and(|j| j.is_empty()) {
                break;
            }
        }

        let mut windows = joint.unwrap_or_default();

        if let Some((start, end)) = preferred_window {
            if start >= end {
                return Err(ScheduleError::InvalidRequest(
                    "Preferred window start must be before its end".to_string(),
                ));
            }
            let wanted = TimeRange::new(
                date.and_time(start).and_utc(),
                date.and_time(end).and_utc(),
            );
            windows = match wanted {
                Some(w) => intersect_sets(&windows, &[w]),
                None => vec![],
            };
        }

        debug!(
            "Availability on {}: {} joint free windows for {} employees",
            date,
            windows.len(),
            employee_ids.len()
        );

        Ok(FreeWindows::new(windows, duration, self.step))
    }

    /// Materialized candidate list, for transport and for storing offered
    /// slots on a confirmation thread.
    pub async fn compute(
        &self,
        organization_id: Uuid,
        employee_ids: &[Uuid],
        service_ids: &[Uuid],
        date: NaiveDate,
        preferred_window: Option<(NaiveTime, NaiveTime)>,
    ) -> Result<Vec<chrono::DateTime<chrono::Utc>>, ScheduleError> {
        let free = self
            .free_windows(
                organization_id,
                employee_ids,
                service_ids,
                date,
                preferred_window,
            )
            .await?;
        Ok(free.candidates().collect())
    }
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}
