use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Owns the appointment state machine. Transition legality is one explicit
/// table; everything else in the cell consults it.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!(
            "Validating status transition from {} to {}",
            current_status, new_status
        );

        if !self
            .valid_transitions(current_status)
            .contains(&new_status)
        {
            warn!(
                "Invalid status transition attempted: {} -> {}",
                current_status, new_status
            );
            return Err(AppointmentError::InvalidTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// All valid next statuses for a given current status
    pub fn valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Scheduled,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::InProgress,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
                AppointmentStatus::Rescheduled,
            ],
            AppointmentStatus::InProgress => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled, // walk-out / emergency
            ],
            AppointmentStatus::Waitlisted => vec![
                AppointmentStatus::Scheduled,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow
            | AppointmentStatus::Rescheduled => vec![],
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        let lifecycle = AppointmentLifecycleService::new();
        for (from, to) in [
            (AppointmentStatus::Pending, AppointmentStatus::Scheduled),
            (AppointmentStatus::Scheduled, AppointmentStatus::InProgress),
            (AppointmentStatus::InProgress, AppointmentStatus::Completed),
            (AppointmentStatus::Scheduled, AppointmentStatus::NoShow),
            (AppointmentStatus::Scheduled, AppointmentStatus::Rescheduled),
            (AppointmentStatus::Waitlisted, AppointmentStatus::Scheduled),
        ] {
            assert!(lifecycle.validate_status_transition(from, to).is_ok());
        }
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let lifecycle = AppointmentLifecycleService::new();
        for from in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
            AppointmentStatus::Rescheduled,
        ] {
            assert!(lifecycle
                .validate_status_transition(from, AppointmentStatus::Scheduled)
                .is_err());
        }
    }

    #[test]
    fn backwards_transition_is_rejected() {
        let lifecycle = AppointmentLifecycleService::new();
        let err = lifecycle
            .validate_status_transition(
                AppointmentStatus::Completed,
                AppointmentStatus::Scheduled,
            )
            .unwrap_err();
        assert!(matches!(err, AppointmentError::InvalidTransition { .. }));
    }
}
