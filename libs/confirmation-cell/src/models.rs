use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CONFIRMATION NOTIFICATION MODELS
// ==============================================================================

/// One outstanding conversational thread with a customer phone number about
/// a specific appointment. Created when the confirmation message goes out;
/// advanced by inbound webhook events; terminal on completion or expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationNotification {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub appointment_id: Uuid,
    pub phone: String,
    /// Messaging-channel instance the thread lives on (one per tenant).
    pub channel_instance: String,
    pub state: ConfirmationState,
    /// Populated while negotiating a reschedule.
    pub desired_date: Option<NaiveDate>,
    /// Slots offered to the customer; the only starts a reschedule accepts.
    pub offered_slots: Vec<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    Sent,
    AwaitingResponse,
    AwaitingDate,
    AwaitingTimeSlot,
    Confirmed,
    CancelledByCustomer,
    Completed,
    Expired,
}

impl ConfirmationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConfirmationState::Completed | ConfirmationState::Expired)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationState::Sent => write!(f, "sent"),
            ConfirmationState::AwaitingResponse => write!(f, "awaiting_response"),
            ConfirmationState::AwaitingDate => write!(f, "awaiting_date"),
            ConfirmationState::AwaitingTimeSlot => write!(f, "awaiting_time_slot"),
            ConfirmationState::Confirmed => write!(f, "confirmed"),
            ConfirmationState::CancelledByCustomer => write!(f, "cancelled_by_customer"),
            ConfirmationState::Completed => write!(f, "completed"),
            ConfirmationState::Expired => write!(f, "expired"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenConfirmationRequest {
    pub appointment_id: Uuid,
    pub phone: String,
    pub channel_instance: String,
}

/// Inbound event from the messaging webhook: a customer replied on some
/// channel instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub phone: String,
    pub channel_instance: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponseRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDesiredDateRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectTimeSlotRequest {
    pub slot: DateTime<Utc>,
}
