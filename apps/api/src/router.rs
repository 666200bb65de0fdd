use axum::{routing::get, Router};

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::appointment_routes;
use billing_cell::handlers::BillingState;
use billing_cell::router::billing_routes;
use confirmation_cell::handlers::ConversationState;
use confirmation_cell::router::confirmation_routes;
use schedule_cell::handlers::ScheduleState;
use schedule_cell::router::schedule_routes;

pub fn create_router(
    schedule: ScheduleState,
    appointments: AppointmentState,
    billing: BillingState,
    confirmations: ConversationState,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Booking API is running!" }))
        .nest("/schedule", schedule_routes(schedule))
        .nest("/appointments", appointment_routes(appointments))
        .nest("/billing", billing_routes(billing))
        .nest("/confirmations", confirmation_routes(confirmations))
}
