use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use schedule_cell::models::ScheduleError;
use schedule_cell::services::availability::BusySource;
use schedule_cell::services::interval::{normalize, TimeRange};

use crate::store::AppointmentStore;

/// Feeds the availability calculator: calendar-blocking appointments of one
/// employee on one date, as occupied intervals.
pub struct BusyIntervalCollector {
    store: Arc<dyn AppointmentStore>,
}

impl BusyIntervalCollector {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BusySource for BusyIntervalCollector {
    async fn busy_intervals(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        date: NaiveDate,
        exclude_appointment: Option<Uuid>,
    ) -> Result<Vec<TimeRange>, ScheduleError> {
        let appointments = self
            .store
            .list_for_employee_on(organization_id, employee_id, date)
            .await
            .map_err(|e| ScheduleError::Storage(e.to_string()))?;

        let occupied = appointments
            .iter()
            .filter(|a| a.status.blocks_calendar())
            .filter(|a| Some(a.id) != exclude_appointment)
            .filter_map(|a| a.time_range())
            .collect();

        Ok(normalize(occupied))
    }
}
