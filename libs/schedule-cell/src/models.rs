use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::rest::StoreError;

// ==============================================================================
// WORK SCHEDULE MODELS
// ==============================================================================

/// One recurring shift of an employee's weekly schedule. `day_of_week` uses
/// 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkShift {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub employee_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
}

/// Organization-wide closure (holiday, renovation). Whole-day granularity:
/// a block covering a date removes every shift of every employee that day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationBlock {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
    pub reason: Option<String>,
}

impl OrganizationBlock {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.active && self.starts_on <= date && date <= self.ends_on
    }
}

/// Catalog entry as seen by the scheduler: only the duration matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDuration {
    pub id: Uuid,
    pub duration_minutes: i64,
}

pub fn day_of_week(weekday: Weekday) -> i32 {
    match weekday {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

// ==============================================================================
// AVAILABILITY REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub duration_minutes: i64,
    pub slots: Vec<chrono::DateTime<chrono::Utc>>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("Employee not found")]
    EmployeeNotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Validation error: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ScheduleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ScheduleError::Storage(msg),
            other => ScheduleError::Storage(other.to_string()),
        }
    }
}
