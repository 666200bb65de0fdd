use chrono::{DateTime, NaiveDate, Utc};

use crate::models::ConfirmationState;
use crate::services::intent::ReplyIntent;

/// Inbound event driving one confirmation conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationEvent {
    /// Customer replied with free text, already classified.
    ResponseRecorded(ReplyIntent),
    /// Customer named the day they want to move to.
    DesiredDateSet(NaiveDate),
    /// Customer picked one of the offered slots.
    SlotSelected(DateTime<Utc>),
    /// The conversation outcome has been applied; close the thread.
    Closed,
    /// The expiry sweep gave up on the thread.
    Expired,
}

/// Side effect the conversation service must carry out for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CancelAppointment,
    /// Compute and store availability for the date, then present it.
    OfferSlots(NaiveDate),
    RescheduleTo(DateTime<Utc>),
    Send(MessageTemplate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTemplate {
    /// Initial outbound message opening the thread; not produced by the
    /// transition function.
    ConfirmationRequest,
    ConfirmationThanks,
    CancellationAck,
    AskForDate,
    PresentSlots,
    NoSlotsForDate,
    SlotAccepted,
    ClarifyReply,
}

/// Result of one transition. `applied` is false when the event was ignored:
/// a replay against a terminal state, or an event that does not apply to
/// the current state. Webhook delivery duplicates and reorders, so ignored
/// events must stay no-ops.
#[derive(Debug, Clone)]
pub struct Step {
    pub next: ConfirmationState,
    pub actions: Vec<Action>,
    pub applied: bool,
}

impl Step {
    fn to(next: ConfirmationState, actions: Vec<Action>) -> Self {
        Self {
            next,
            actions,
            applied: true,
        }
    }

    pub fn ignored(current: ConfirmationState) -> Self {
        Self {
            next: current,
            actions: vec![],
            applied: false,
        }
    }
}

/// The whole conversation state machine as one transition function:
/// (current state, event) -> (next state, side effects). No storage, no
/// transport; every transition is testable in isolation.
pub fn step(state: ConfirmationState, event: ConversationEvent) -> Step {
    use ConfirmationState::*;
    use ConversationEvent as Ev;

    if state.is_terminal() {
        return Step::ignored(state);
    }

    match (state, event) {
        (Sent | AwaitingResponse, Ev::ResponseRecorded(intent)) => match intent {
            ReplyIntent::Confirm => Step::to(
                Confirmed,
                vec![Action::Send(MessageTemplate::ConfirmationThanks)],
            ),
            ReplyIntent::Cancel => cancelled_by_customer(),
            ReplyIntent::Reschedule => Step::to(
                AwaitingDate,
                vec![Action::Send(MessageTemplate::AskForDate)],
            ),
            ReplyIntent::Unknown => Step::to(
                AwaitingResponse,
                vec![Action::Send(MessageTemplate::ClarifyReply)],
            ),
        },

        // While negotiating, the customer can still bail out entirely.
        (AwaitingDate | AwaitingTimeSlot, Ev::ResponseRecorded(ReplyIntent::Cancel)) => {
            cancelled_by_customer()
        }

        (AwaitingDate | AwaitingTimeSlot, Ev::DesiredDateSet(date)) => {
            Step::to(AwaitingTimeSlot, vec![Action::OfferSlots(date)])
        }

        (AwaitingTimeSlot, Ev::SlotSelected(slot)) => Step::to(
            Completed,
            vec![
                Action::RescheduleTo(slot),
                Action::Send(MessageTemplate::SlotAccepted),
            ],
        ),

        (_, Ev::Closed) => Step::to(Completed, vec![]),
        (_, Ev::Expired) => Step::to(Expired, vec![]),

        _ => Step::ignored(state),
    }
}

fn cancelled_by_customer() -> Step {
    Step::to(
        ConfirmationState::CancelledByCustomer,
        vec![
            Action::CancelAppointment,
            Action::Send(MessageTemplate::CancellationAck),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn confirm_reply_moves_to_confirmed() {
        let step = step(
            ConfirmationState::Sent,
            ConversationEvent::ResponseRecorded(ReplyIntent::Confirm),
        );
        assert!(step.applied);
        assert_eq!(step.next, ConfirmationState::Confirmed);
    }

    #[test]
    fn reschedule_intent_asks_for_a_date() {
        let step = step(
            ConfirmationState::AwaitingResponse,
            ConversationEvent::ResponseRecorded(ReplyIntent::Reschedule),
        );
        assert_eq!(step.next, ConfirmationState::AwaitingDate);
        assert!(step
            .actions
            .contains(&Action::Send(MessageTemplate::AskForDate)));
    }

    #[test]
    fn desired_date_triggers_a_slot_offer() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let step = step(
            ConfirmationState::AwaitingDate,
            ConversationEvent::DesiredDateSet(date),
        );
        assert_eq!(step.next, ConfirmationState::AwaitingTimeSlot);
        assert_eq!(step.actions, vec![Action::OfferSlots(date)]);
    }

    #[test]
    fn slot_selection_reschedules_and_completes() {
        let slot = Utc.with_ymd_and_hms(2026, 3, 9, 14, 0, 0).unwrap();
        let step = step(
            ConfirmationState::AwaitingTimeSlot,
            ConversationEvent::SlotSelected(slot),
        );
        assert_eq!(step.next, ConfirmationState::Completed);
        assert_eq!(step.actions[0], Action::RescheduleTo(slot));
    }

    #[test]
    fn cancel_is_reachable_from_every_negotiation_state() {
        for state in [
            ConfirmationState::Sent,
            ConfirmationState::AwaitingResponse,
            ConfirmationState::AwaitingDate,
            ConfirmationState::AwaitingTimeSlot,
        ] {
            let step = step(
                state,
                ConversationEvent::ResponseRecorded(ReplyIntent::Cancel),
            );
            assert_eq!(step.next, ConfirmationState::CancelledByCustomer);
            assert!(step.actions.contains(&Action::CancelAppointment));
        }
    }

    #[test]
    fn terminal_states_ignore_every_event() {
        let slot = Utc.with_ymd_and_hms(2026, 3, 9, 14, 0, 0).unwrap();
        for state in [ConfirmationState::Completed, ConfirmationState::Expired] {
            for event in [
                ConversationEvent::ResponseRecorded(ReplyIntent::Cancel),
                ConversationEvent::SlotSelected(slot),
                ConversationEvent::Closed,
                ConversationEvent::Expired,
            ] {
                let step = step(state, event);
                assert!(!step.applied);
                assert_eq!(step.next, state);
                assert!(step.actions.is_empty());
            }
        }
    }

    #[test]
    fn slot_selection_outside_awaiting_time_slot_is_ignored() {
        let slot = Utc.with_ymd_and_hms(2026, 3, 9, 14, 0, 0).unwrap();
        let step = step(
            ConfirmationState::Sent,
            ConversationEvent::SlotSelected(slot),
        );
        assert!(!step.applied);
    }
}
