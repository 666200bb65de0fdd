use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use billing_cell::models::ChargeError;
use schedule_cell::models::ScheduleError;
use schedule_cell::services::interval::TimeRange;
use shared_database::rest::StoreError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// One booking. References at least one employee and one service; the end
/// time is derived from the summed service durations at creation. Never
/// physically deleted: cancellation is a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub customer_id: Uuid,
    pub employee_ids: Vec<Uuid>,
    pub service_ids: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub charge_ids: Vec<Uuid>,
    /// Set on a Rescheduled original, pointing at its replacement.
    pub rescheduled_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn time_range(&self) -> Option<TimeRange> {
        TimeRange::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
    Waitlisted,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::NoShow
                | AppointmentStatus::Rescheduled
        )
    }

    /// Whether an appointment in this status occupies employee time. A
    /// rescheduled original is replaced by its successor; a waitlisted
    /// request holds no slot.
    pub fn blocks_calendar(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending
                | AppointmentStatus::Scheduled
                | AppointmentStatus::InProgress
                | AppointmentStatus::Completed
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Waitlisted => write!(f, "waitlisted"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub customer_id: Uuid,
    pub employee_ids: Vec<Uuid>,
    pub service_ids: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    /// Price to bill at booking time. Absent when billing happens later.
    pub charge: Option<ChargeInstruction>,
    /// Hold the booking in Pending until its charges are fully settled.
    #[serde(default)]
    pub require_payment_confirmation: bool,
    /// Park the request as Waitlisted instead of failing when no slot fits.
    #[serde(default)]
    pub waitlist_if_unavailable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeInstruction {
    pub total_cents: i64,
    pub deposit_percentage: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
    /// Refund collected charges as part of the cancellation instead of
    /// failing with a conflict.
    #[serde(default)]
    pub refund_first: bool,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Employee not found")]
    EmployeeNotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Appointment slot not available")]
    SlotUnavailable,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppointmentError::NotFound,
            // The store's overlap exclusion rejected the write: surface it
            // exactly as a failed slot validation.
            StoreError::RowConflict(_) => AppointmentError::SlotUnavailable,
            other => AppointmentError::Storage(other.to_string()),
        }
    }
}

impl From<ScheduleError> for AppointmentError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::EmployeeNotFound => AppointmentError::EmployeeNotFound,
            ScheduleError::ServiceNotFound => AppointmentError::ServiceNotFound,
            ScheduleError::InvalidRequest(msg) => AppointmentError::InvalidRequest(msg),
            ScheduleError::Storage(msg) => AppointmentError::Storage(msg),
        }
    }
}

impl From<ChargeError> for AppointmentError {
    fn from(err: ChargeError) -> Self {
        match err {
            ChargeError::NotFound => {
                AppointmentError::Conflict("Referenced charge not found".to_string())
            }
            ChargeError::Conflict(msg) => AppointmentError::Conflict(msg),
            ChargeError::InvalidRequest(msg) => AppointmentError::InvalidRequest(msg),
            ChargeError::Storage(msg) => AppointmentError::Storage(msg),
        }
    }
}
