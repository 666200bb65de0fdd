use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_database::rest::StoreError;

// ==============================================================================
// CHARGE MODELS
// ==============================================================================

/// Money owed for an appointment. Amounts are integer cents. A deposit
/// ("sinal") split produces two rows: a Deposit charge carrying the
/// percentage and a Remainder charge pointing back at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub appointment_id: Uuid,
    pub kind: ChargeKind,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub status: ChargeStatus,
    pub deposit_percentage: Option<u8>,
    pub parent_charge_id: Option<Uuid>,
    pub last_payment_method: Option<PaymentMethod>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Charge {
    /// Money has been collected and not returned. Such a charge blocks
    /// appointment cancellation until explicitly refunded.
    pub fn has_collected_funds(&self) -> bool {
        self.paid_cents > 0
            && !matches!(self.status, ChargeStatus::Refunded | ChargeStatus::Cancelled)
    }

    pub fn outstanding_cents(&self) -> i64 {
        self.total_cents - self.paid_cents
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    Full,
    Deposit,
    Remainder,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Cancelled,
    Refunded,
}

impl ChargeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChargeStatus::Cancelled | ChargeStatus::Refunded)
    }
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChargeStatus::Pending => write!(f, "pending"),
            ChargeStatus::PartiallyPaid => write!(f, "partially_paid"),
            ChargeStatus::Paid => write!(f, "paid"),
            ChargeStatus::Cancelled => write!(f, "cancelled"),
            ChargeStatus::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    DebitCard,
    Cash,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChargeRequest {
    pub appointment_id: Uuid,
    pub total_cents: i64,
    /// When set, splits the charge into a deposit collected upfront and a
    /// remainder settled at the appointment.
    pub deposit_percentage: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessPaymentRequest {
    pub amount_cents: i64,
    pub method: PaymentMethod,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChargeError {
    #[error("Charge not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ChargeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ChargeError::NotFound,
            StoreError::RowConflict(msg) => ChargeError::Conflict(msg),
            other => ChargeError::Storage(other.to_string()),
        }
    }
}
