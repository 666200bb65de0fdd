use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{AppointmentStatus, ChargeInstruction, CreateAppointmentRequest};
use appointment_cell::services::booking::BookingService;
use appointment_cell::services::busy::BusyIntervalCollector;
use appointment_cell::store::MemoryAppointmentStore;
use billing_cell::models::PaymentMethod;
use billing_cell::services::charges::{ChargeCoordinator, ChargeLedger};
use billing_cell::store::MemoryChargeStore;
use confirmation_cell::error::ConfirmationError;
use confirmation_cell::models::{ConfirmationState, OpenConfirmationRequest};
use confirmation_cell::services::conversation::{ConfirmationSender, ConversationService};
use confirmation_cell::store::MemoryNotificationStore;
use schedule_cell::models::WorkShift;
use schedule_cell::services::availability::AvailabilityService;
use schedule_cell::store::MemoryScheduleStore;

// ==============================================================================
// TEST FIXTURES
// ==============================================================================

#[derive(Default)]
struct RecordingSender {
    messages: Mutex<Vec<String>>,
}

impl RecordingSender {
    fn sent(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfirmationSender for RecordingSender {
    async fn send(
        &self,
        _phone: &str,
        _channel_instance: &str,
        body: &str,
    ) -> Result<(), ConfirmationError> {
        self.messages.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

struct Env {
    org: Uuid,
    employee: Uuid,
    service: Uuid,
    customer: Uuid,
    booking: Arc<BookingService>,
    charges: Arc<ChargeCoordinator>,
    conversation: Arc<ConversationService>,
    sender: Arc<RecordingSender>,
}

/// Mondays 08:00-18:00, one 60-minute service, 15-minute granularity, full
/// in-memory stack with a recording outbound sender.
fn env() -> Env {
    let schedules = Arc::new(MemoryScheduleStore::new());
    let appointments = Arc::new(MemoryAppointmentStore::new());
    let charge_store = Arc::new(MemoryChargeStore::new());
    let notifications = Arc::new(MemoryNotificationStore::new());
    let sender = Arc::new(RecordingSender::default());

    let org = Uuid::new_v4();
    let employee = Uuid::new_v4();
    let service = Uuid::new_v4();
    let customer = Uuid::new_v4();

    schedules.add_employee(org, employee);
    schedules.add_service(org, service, 60);
    schedules.add_shift(WorkShift {
        id: Uuid::new_v4(),
        organization_id: org,
        employee_id: employee,
        day_of_week: 1,
        start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        active: true,
    });

    let busy = Arc::new(BusyIntervalCollector::new(appointments.clone()));
    let availability = Arc::new(AvailabilityService::new(
        schedules.clone(),
        schedules,
        busy,
        15,
    ));
    let charges = Arc::new(ChargeCoordinator::new(charge_store));
    let booking = Arc::new(BookingService::new(
        appointments,
        availability.clone(),
        charges.clone(),
    ));
    charges.set_appointment_hook(booking.clone());

    let conversation = Arc::new(ConversationService::new(
        notifications,
        booking.clone(),
        availability,
        sender.clone(),
    ));

    Env {
        org,
        employee,
        service,
        customer,
        booking,
        charges,
        conversation,
        sender,
    }
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

fn next_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
}

async fn booked_thread(env: &Env) -> (Uuid, Uuid) {
    let appointment = env
        .booking
        .create_appointment(
            env.org,
            CreateAppointmentRequest {
                customer_id: env.customer,
                employee_ids: vec![env.employee],
                service_ids: vec![env.service],
                start_time: at(10, 0),
                charge: None,
                require_payment_confirmation: false,
                waitlist_if_unavailable: false,
            },
        )
        .await
        .unwrap();

    let notification = env
        .conversation
        .open_confirmation(
            env.org,
            OpenConfirmationRequest {
                appointment_id: appointment.id,
                phone: "+5511999990000".to_string(),
                channel_instance: "wa-main".to_string(),
            },
        )
        .await
        .unwrap();

    (appointment.id, notification.id)
}

// ==============================================================================
// BASIC FLOW
// ==============================================================================

#[tokio::test]
async fn opening_a_thread_sends_the_confirmation_request() {
    let env = env();
    let (_, notification_id) = booked_thread(&env).await;

    let pending = env
        .conversation
        .get_pending("+5511999990000", "wa-main")
        .await
        .unwrap()
        .expect("thread should be pending");
    assert_eq!(pending.id, notification_id);
    assert_eq!(pending.state, ConfirmationState::Sent);
    assert_eq!(env.sender.sent().len(), 1);
}

#[tokio::test]
async fn confirm_reply_closes_the_thread() {
    let env = env();
    let (appointment_id, notification_id) = booked_thread(&env).await;

    let updated = env
        .conversation
        .record_response(notification_id, "sim, confirmo")
        .await
        .unwrap();

    assert_eq!(updated.state, ConfirmationState::Completed);
    let appointment = env
        .booking
        .get_appointment(env.org, appointment_id)
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);

    // Closed threads no longer answer the pending lookup.
    assert!(env
        .conversation
        .get_pending("+5511999990000", "wa-main")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unclassifiable_reply_asks_for_clarification() {
    let env = env();
    let (_, notification_id) = booked_thread(&env).await;

    let updated = env
        .conversation
        .record_response(notification_id, "???")
        .await
        .unwrap();

    assert_eq!(updated.state, ConfirmationState::AwaitingResponse);
    assert!(env.sender.sent().last().unwrap().contains("didn't catch"));
}

// ==============================================================================
// CANCELLATION VIA CHAT
// ==============================================================================

#[tokio::test]
async fn cancel_reply_cancels_the_appointment() {
    let env = env();
    let (appointment_id, notification_id) = booked_thread(&env).await;

    let updated = env
        .conversation
        .record_response(notification_id, "não vou poder, pode cancelar")
        .await
        .unwrap();

    assert_eq!(updated.state, ConfirmationState::Completed);
    let appointment = env
        .booking
        .get_appointment(env.org, appointment_id)
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn cancel_reply_refunds_a_paid_deposit() {
    let env = env();

    let appointment = env
        .booking
        .create_appointment(
            env.org,
            CreateAppointmentRequest {
                customer_id: env.customer,
                employee_ids: vec![env.employee],
                service_ids: vec![env.service],
                start_time: at(10, 0),
                charge: Some(ChargeInstruction {
                    total_cents: 10_000,
                    deposit_percentage: Some(30),
                }),
                require_payment_confirmation: false,
                waitlist_if_unavailable: false,
            },
        )
        .await
        .unwrap();
    env.charges
        .process_payment(env.org, appointment.charge_ids[0], 3_000, PaymentMethod::Pix)
        .await
        .unwrap();

    let notification = env
        .conversation
        .open_confirmation(
            env.org,
            OpenConfirmationRequest {
                appointment_id: appointment.id,
                phone: "+5511999990000".to_string(),
                channel_instance: "wa-main".to_string(),
            },
        )
        .await
        .unwrap();

    env.conversation
        .record_response(notification.id, "cancelar")
        .await
        .unwrap();

    let reloaded = env
        .booking
        .get_appointment(env.org, appointment.id)
        .await
        .unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Cancelled);
    assert!(env
        .charges
        .blocking_charges(env.org, appointment.id)
        .await
        .unwrap()
        .is_empty());
}

// ==============================================================================
// RESCHEDULING VIA CHAT
// ==============================================================================

#[tokio::test]
async fn reschedule_negotiation_moves_the_appointment() {
    let env = env();
    let (appointment_id, notification_id) = booked_thread(&env).await;

    // "I need another day" -> asked for a date.
    let updated = env
        .conversation
        .record_response(notification_id, "preciso remarcar")
        .await
        .unwrap();
    assert_eq!(updated.state, ConfirmationState::AwaitingDate);

    // Customer names a day -> slots offered.
    let updated = env
        .conversation
        .set_desired_date(notification_id, next_monday())
        .await
        .unwrap();
    assert_eq!(updated.state, ConfirmationState::AwaitingTimeSlot);
    assert_eq!(updated.desired_date, Some(next_monday()));
    assert!(!updated.offered_slots.is_empty());
    let chosen = updated.offered_slots[0];

    // Customer picks an offered slot -> rescheduled and closed.
    let updated = env
        .conversation
        .select_time_slot(notification_id, chosen)
        .await
        .unwrap();
    assert_eq!(updated.state, ConfirmationState::Completed);

    let original = env
        .booking
        .get_appointment(env.org, appointment_id)
        .await
        .unwrap();
    assert_eq!(original.status, AppointmentStatus::Rescheduled);

    let replacement = env
        .booking
        .get_appointment(env.org, original.rescheduled_to.unwrap())
        .await
        .unwrap();
    assert_eq!(replacement.start_time, chosen);
    assert_eq!(replacement.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn arbitrary_slot_outside_the_offer_is_rejected() {
    let env = env();
    let (_, notification_id) = booked_thread(&env).await;

    env.conversation
        .record_response(notification_id, "remarcar")
        .await
        .unwrap();
    env.conversation
        .set_desired_date(notification_id, next_monday())
        .await
        .unwrap();

    // 10:07 was never offered.
    let off_menu = Utc.with_ymd_and_hms(2026, 3, 9, 10, 7, 0).unwrap();
    let result = env
        .conversation
        .select_time_slot(notification_id, off_menu)
        .await;
    assert_matches!(result, Err(ConfirmationError::InvalidRequest(_)));
}

#[tokio::test]
async fn blocked_day_keeps_asking_for_a_date() {
    let env = env();
    let (_, notification_id) = booked_thread(&env).await;

    env.conversation
        .record_response(notification_id, "remarcar")
        .await
        .unwrap();

    // Sunday has no shifts at all.
    let sunday = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
    let updated = env
        .conversation
        .set_desired_date(notification_id, sunday)
        .await
        .unwrap();

    assert_eq!(updated.state, ConfirmationState::AwaitingDate);
    assert!(updated.offered_slots.is_empty());
    assert!(env.sender.sent().last().unwrap().contains("no open times"));
}

// ==============================================================================
// IDEMPOTENT WEBHOOK REPLAY
// ==============================================================================

#[tokio::test]
async fn replaying_a_cancel_after_completion_is_a_noop() {
    let env = env();
    let (appointment_id, notification_id) = booked_thread(&env).await;

    env.conversation
        .record_response(notification_id, "cancelar")
        .await
        .unwrap();
    let cancelled_at = env
        .booking
        .get_appointment(env.org, appointment_id)
        .await
        .unwrap()
        .updated_at;

    // Same webhook delivered again: no error, no second cancellation.
    let replay = env
        .conversation
        .record_response(notification_id, "cancelar")
        .await
        .unwrap();
    assert_eq!(replay.state, ConfirmationState::Completed);

    let appointment = env
        .booking
        .get_appointment(env.org, appointment_id)
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(appointment.updated_at, cancelled_at);
}

#[tokio::test]
async fn completing_twice_is_a_noop() {
    let env = env();
    let (_, notification_id) = booked_thread(&env).await;

    env.conversation
        .record_response(notification_id, "sim")
        .await
        .unwrap();
    let first = env.conversation.complete(notification_id).await.unwrap();
    let second = env.conversation.complete(notification_id).await.unwrap();
    assert_eq!(first.state, ConfirmationState::Completed);
    assert_eq!(second.state, ConfirmationState::Completed);
}

#[tokio::test]
async fn unknown_notification_is_not_found() {
    let env = env();
    let result = env
        .conversation
        .record_response(Uuid::new_v4(), "sim")
        .await;
    assert_matches!(result, Err(ConfirmationError::NotFound));
}

// ==============================================================================
// EXPIRY SWEEP
// ==============================================================================

#[tokio::test]
async fn stale_threads_expire_and_closed_threads_do_not() {
    let env = env();
    let (_, stale_id) = booked_thread(&env).await;

    // A second thread that already completed.
    let done = env
        .booking
        .create_appointment(
            env.org,
            CreateAppointmentRequest {
                customer_id: env.customer,
                employee_ids: vec![env.employee],
                service_ids: vec![env.service],
                start_time: at(14, 0),
                charge: None,
                require_payment_confirmation: false,
                waitlist_if_unavailable: false,
            },
        )
        .await
        .unwrap();
    let done_thread = env
        .conversation
        .open_confirmation(
            env.org,
            OpenConfirmationRequest {
                appointment_id: done.id,
                phone: "+5511888880000".to_string(),
                channel_instance: "wa-main".to_string(),
            },
        )
        .await
        .unwrap();
    env.conversation
        .record_response(done_thread.id, "sim")
        .await
        .unwrap();

    // Everything written so far predates a future cutoff.
    let expired = env
        .conversation
        .expire_stale(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(expired, 1);

    let stale = env.conversation.complete(stale_id).await.unwrap();
    assert_eq!(stale.state, ConfirmationState::Expired);
}
