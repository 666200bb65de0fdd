use thiserror::Error;

use shared_database::rest::StoreError;

#[derive(Error, Debug, Clone)]
pub enum ConfirmationError {
    #[error("Notification not found")]
    NotFound,

    /// A concurrent webhook delivery already advanced this conversation.
    /// Callers treat it as an applied duplicate, not a failure.
    #[error("Notification already advanced")]
    Superseded,

    #[error("Validation error: {0}")]
    InvalidRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ConfirmationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ConfirmationError::NotFound,
            StoreError::RowConflict(_) => ConfirmationError::Superseded,
            other => ConfirmationError::Storage(other.to_string()),
        }
    }
}
