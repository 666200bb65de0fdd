use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use appointment_cell::models::AppointmentError;
use appointment_cell::services::booking::BookingService;
use schedule_cell::services::availability::AvailabilityService;

use crate::error::ConfirmationError;
use crate::models::{ConfirmationNotification, ConfirmationState, OpenConfirmationRequest};
use crate::services::engine::{self, Action, ConversationEvent, MessageTemplate};
use crate::services::intent::IntentClassifier;
use crate::store::{NotificationStore, NotificationUpdate};

/// Chat messages stay short; offering more starts than this reads badly on
/// a phone.
const MAX_OFFERED_SLOTS: usize = 8;

/// Outbound side of the conversation. The actual delivery transport
/// (WhatsApp gateway, push) lives outside this service.
#[async_trait]
pub trait ConfirmationSender: Send + Sync {
    async fn send(
        &self,
        phone: &str,
        channel_instance: &str,
        body: &str,
    ) -> Result<(), ConfirmationError>;
}

/// Default sender: logs the message and succeeds. Deployments plug a real
/// gateway in here.
pub struct TracingSender;

#[async_trait]
impl ConfirmationSender for TracingSender {
    async fn send(
        &self,
        phone: &str,
        channel_instance: &str,
        body: &str,
    ) -> Result<(), ConfirmationError> {
        info!("Outbound message to {} via {}: {}", phone, channel_instance, body);
        Ok(())
    }
}

/// Drives confirmation threads from inbound webhook events. Every mutation
/// wins a compare-and-swap on the thread state before its side effects run,
/// so duplicated or reordered deliveries collapse into no-ops.
pub struct ConversationService {
    store: Arc<dyn NotificationStore>,
    booking: Arc<BookingService>,
    availability: Arc<AvailabilityService>,
    sender: Arc<dyn ConfirmationSender>,
    classifier: IntentClassifier,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        booking: Arc<BookingService>,
        availability: Arc<AvailabilityService>,
        sender: Arc<dyn ConfirmationSender>,
    ) -> Self {
        Self {
            store,
            booking,
            availability,
            sender,
            classifier: IntentClassifier::new(),
        }
    }

    /// Open a confirmation thread for an appointment and send the initial
    /// message.
    pub async fn open_confirmation(
        &self,
        organization_id: Uuid,
        request: OpenConfirmationRequest,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let appointment = self
            .booking
            .get_appointment(organization_id, request.appointment_id)
            .await
            .map_err(map_appointment_error)?;

        let now = Utc::now();
        let notification = self
            .store
            .insert(ConfirmationNotification {
                id: Uuid::new_v4(),
                organization_id,
                appointment_id: appointment.id,
                phone: request.phone,
                channel_instance: request.channel_instance,
                state: ConfirmationState::Sent,
                desired_date: None,
                offered_slots: vec![],
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.deliver(
            &notification,
            MessageTemplate::ConfirmationRequest,
            &format!(
                "Hi! Can you confirm your appointment on {}? Reply CONFIRM, CANCEL or RESCHEDULE.",
                appointment.start_time.format("%Y-%m-%d at %H:%M")
            ),
        )
        .await;

        info!(
            "Confirmation thread {} opened for appointment {}",
            notification.id, appointment.id
        );
        Ok(notification)
    }

    /// Newest active thread for a phone number on a channel instance.
    pub async fn get_pending(
        &self,
        phone: &str,
        channel_instance: &str,
    ) -> Result<Option<ConfirmationNotification>, ConfirmationError> {
        self.store.find_active_by_phone(phone, channel_instance).await
    }

    /// Classify a free-text reply and advance the thread.
    pub async fn record_response(
        &self,
        notification_id: Uuid,
        text: &str,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let notification = self.store.get(notification_id).await?;
        let intent = self.classifier.classify(text);
        debug!(
            "Reply on thread {} classified as {:?}",
            notification_id, intent
        );

        let step = engine::step(
            notification.state,
            ConversationEvent::ResponseRecorded(intent),
        );
        if !step.applied {
            debug!(
                "Ignoring reply for thread {} in state {}",
                notification_id, notification.state
            );
            return Ok(notification);
        }

        let updated = match self
            .store
            .transition(
                notification_id,
                notification.state,
                step.next,
                NotificationUpdate::default(),
            )
            .await
        {
            Ok(updated) => updated,
            Err(ConfirmationError::Superseded) => {
                debug!("Duplicate delivery for thread {}, no-op", notification_id);
                return self.store.get(notification_id).await;
            }
            Err(err) => return Err(err),
        };

        for action in &step.actions {
            match action {
                Action::CancelAppointment => {
                    self.cancel_appointment(&updated).await;
                }
                Action::Send(template) => {
                    self.send_template(&updated, *template).await;
                }
                other => {
                    warn!("Unexpected action {:?} from reply transition", other);
                }
            }
        }

        // Outcome applied: close the thread.
        if matches!(
            updated.state,
            ConfirmationState::Confirmed | ConfirmationState::CancelledByCustomer
        ) {
            return self.close(notification_id, updated.state).await;
        }

        Ok(updated)
    }

    /// The customer named a day: compute availability and offer slots.
    pub async fn set_desired_date(
        &self,
        notification_id: Uuid,
        date: NaiveDate,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let notification = self.store.get(notification_id).await?;
        let step = engine::step(notification.state, ConversationEvent::DesiredDateSet(date));
        if !step.applied {
            debug!(
                "Ignoring desired date for thread {} in state {}",
                notification_id, notification.state
            );
            return Ok(notification);
        }

        let appointment = self
            .booking
            .get_appointment(notification.organization_id, notification.appointment_id)
            .await
            .map_err(map_appointment_error)?;

        // The appointment being moved vacates its own slot, so it must not
        // mask candidates on its current day.
        let free = self
            .availability
            .free_windows_excluding(
                notification.organization_id,
                &appointment.employee_ids,
                &appointment.service_ids,
                date,
                None,
                Some(appointment.id),
            )
            .await
            .map_err(|e| ConfirmationError::Storage(e.to_string()))?;
        let slots: Vec<DateTime<Utc>> = free.candidates().take(MAX_OFFERED_SLOTS).collect();

        if slots.is_empty() {
            // Stay where we are, remember the ask, and prompt for another day.
            let updated = match self
                .store
                .transition(
                    notification_id,
                    notification.state,
                    notification.state,
                    NotificationUpdate {
                        desired_date: Some(date),
                        offered_slots: None,
                    },
                )
                .await
            {
                Ok(updated) => updated,
                Err(ConfirmationError::Superseded) => {
                    return self.store.get(notification_id).await
                }
                Err(err) => return Err(err),
            };
            self.send_template(&updated, MessageTemplate::NoSlotsForDate)
                .await;
            return Ok(updated);
        }

        let updated = match self
            .store
            .transition(
                notification_id,
                notification.state,
                step.next,
                NotificationUpdate {
                    desired_date: Some(date),
                    offered_slots: Some(slots),
                },
            )
            .await
        {
            Ok(updated) => updated,
            Err(ConfirmationError::Superseded) => {
                debug!("Duplicate desired-date for thread {}, no-op", notification_id);
                return self.store.get(notification_id).await;
            }
            Err(err) => return Err(err),
        };

        self.send_template(&updated, MessageTemplate::PresentSlots)
            .await;
        Ok(updated)
    }

    /// The customer picked a start time. Only previously offered candidates
    /// are accepted; arbitrary client-supplied times are rejected.
    pub async fn select_time_slot(
        &self,
        notification_id: Uuid,
        slot: DateTime<Utc>,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let notification = self.store.get(notification_id).await?;
        let step = engine::step(notification.state, ConversationEvent::SlotSelected(slot));
        if !step.applied {
            debug!(
                "Ignoring slot selection for thread {} in state {}",
                notification_id, notification.state
            );
            return Ok(notification);
        }

        if !notification.offered_slots.contains(&slot) {
            return Err(ConfirmationError::InvalidRequest(
                "Selected time is not among the offered slots".to_string(),
            ));
        }

        // Claim the thread before touching the appointment so a duplicate
        // delivery cannot reschedule twice.
        let claimed = match self
            .store
            .transition(
                notification_id,
                notification.state,
                step.next,
                NotificationUpdate::default(),
            )
            .await
        {
            Ok(claimed) => claimed,
            Err(ConfirmationError::Superseded) => {
                debug!("Duplicate slot selection for thread {}, no-op", notification_id);
                return self.store.get(notification_id).await;
            }
            Err(err) => return Err(err),
        };

        match self
            .booking
            .reschedule_appointment(
                notification.organization_id,
                notification.appointment_id,
                slot,
            )
            .await
        {
            Ok(replacement) => {
                info!(
                    "Thread {} rescheduled appointment {} to {}",
                    notification_id, notification.appointment_id, replacement.start_time
                );
                self.send_template(&claimed, MessageTemplate::SlotAccepted)
                    .await;
                Ok(claimed)
            }
            Err(AppointmentError::SlotUnavailable) => {
                // The offer went stale; reopen the thread so the customer
                // can pick again.
                let reopened = self
                    .store
                    .transition(
                        notification_id,
                        claimed.state,
                        ConfirmationState::AwaitingTimeSlot,
                        NotificationUpdate::default(),
                    )
                    .await
                    .unwrap_or(claimed);
                self.send_template(&reopened, MessageTemplate::NoSlotsForDate)
                    .await;
                Err(ConfirmationError::Conflict(
                    "Selected slot is no longer available".to_string(),
                ))
            }
            Err(err) => {
                // Already moved or cancelled elsewhere; the thread stays
                // closed and the discrepancy is only logged.
                warn!(
                    "Reschedule via thread {} failed after claim: {}",
                    notification_id, err
                );
                Ok(claimed)
            }
        }
    }

    /// Close the thread once its outcome has been applied.
    pub async fn complete(
        &self,
        notification_id: Uuid,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        let notification = self.store.get(notification_id).await?;
        let step = engine::step(notification.state, ConversationEvent::Closed);
        if !step.applied {
            return Ok(notification);
        }
        self.close(notification_id, notification.state).await
    }

    /// Periodic sweep: expire active threads untouched since the cutoff.
    /// Returns how many threads were expired.
    pub async fn expire_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, ConfirmationError> {
        let stale = self.store.list_stale(cutoff).await?;
        let mut expired = 0;

        for notification in stale {
            let step = engine::step(notification.state, ConversationEvent::Expired);
            if !step.applied {
                continue;
            }
            match self
                .store
                .transition(
                    notification.id,
                    notification.state,
                    step.next,
                    NotificationUpdate::default(),
                )
                .await
            {
                Ok(_) => expired += 1,
                Err(ConfirmationError::Superseded) => {
                    // The thread moved while we were sweeping; leave it be.
                }
                Err(err) => {
                    error!("Failed to expire thread {}: {}", notification.id, err);
                }
            }
        }

        if expired > 0 {
            info!("Expired {} stale confirmation thread(s)", expired);
        }
        Ok(expired)
    }

    async fn close(
        &self,
        notification_id: Uuid,
        from: ConfirmationState,
    ) -> Result<ConfirmationNotification, ConfirmationError> {
        match self
            .store
            .transition(
                notification_id,
                from,
                ConfirmationState::Completed,
                NotificationUpdate::default(),
            )
            .await
        {
            Ok(closed) => Ok(closed),
            Err(ConfirmationError::Superseded) => self.store.get(notification_id).await,
            Err(err) => Err(err),
        }
    }

    async fn cancel_appointment(&self, notification: &ConfirmationNotification) {
        match self
            .booking
            .cancel_appointment(
                notification.organization_id,
                notification.appointment_id,
                true,
            )
            .await
        {
            Ok(_) => info!(
                "Appointment {} cancelled by customer via thread {}",
                notification.appointment_id, notification.id
            ),
            Err(AppointmentError::InvalidTransition { from, .. }) => warn!(
                "Customer cancellation of appointment {} skipped, already {}",
                notification.appointment_id, from
            ),
            Err(err) => error!(
                "Customer cancellation of appointment {} failed: {}",
                notification.appointment_id, err
            ),
        }
    }

    async fn send_template(
        &self,
        notification: &ConfirmationNotification,
        template: MessageTemplate,
    ) {
        let body = match template {
            MessageTemplate::ConfirmationRequest => {
                "Can you confirm your appointment? Reply CONFIRM, CANCEL or RESCHEDULE."
                    .to_string()
            }
            MessageTemplate::ConfirmationThanks => {
                "Thank you! Your appointment is confirmed. See you there.".to_string()
            }
            MessageTemplate::CancellationAck => {
                "Your appointment has been cancelled. Anything paid upfront will be refunded."
                    .to_string()
            }
            MessageTemplate::AskForDate => {
                "No problem. Which day works better for you? Reply with a date like 2026-03-09."
                    .to_string()
            }
            MessageTemplate::PresentSlots => format!(
                "Here are the open times: {}. Reply with the one you want.",
                format_slots(&notification.offered_slots)
            ),
            MessageTemplate::NoSlotsForDate => {
                "That day has no open times. Which other day works for you?".to_string()
            }
            MessageTemplate::SlotAccepted => {
                "Done! Your appointment has been moved. See you then.".to_string()
            }
            MessageTemplate::ClarifyReply => {
                "Sorry, I didn't catch that. Reply CONFIRM, CANCEL or RESCHEDULE.".to_string()
            }
        };
        self.deliver(notification, template, &body).await;
    }

    async fn deliver(
        &self,
        notification: &ConfirmationNotification,
        template: MessageTemplate,
        body: &str,
    ) {
        if let Err(err) = self
            .sender
            .send(&notification.phone, &notification.channel_instance, body)
            .await
        {
            // Delivery failures never roll conversation state back; the
            // customer can always reply or the sweep will expire the thread.
            error!(
                "Failed to send {:?} for thread {}: {}",
                template, notification.id, err
            );
        }
    }
}

fn format_slots(slots: &[DateTime<Utc>]) -> String {
    slots
        .iter()
        .map(|slot| slot.format("%H:%M").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn map_appointment_error(err: AppointmentError) -> ConfirmationError {
    match err {
        AppointmentError::NotFound => {
            ConfirmationError::Conflict("Appointment no longer exists".to_string())
        }
        AppointmentError::Conflict(msg) => ConfirmationError::Conflict(msg),
        AppointmentError::InvalidRequest(msg) => ConfirmationError::InvalidRequest(msg),
        other => ConfirmationError::Storage(other.to_string()),
    }
}
