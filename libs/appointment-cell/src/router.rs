use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::extractor::tenant_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: AppointmentState) -> Router {
    Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/{appointment_id}/status",
            put(handlers::update_appointment_status),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route(
            "/{appointment_id}/reschedule",
            patch(handlers::reschedule_appointment),
        )
        .route(
            "/customers/{customer_id}",
            get(handlers::get_customer_appointments),
        )
        .route(
            "/employees/{employee_id}",
            get(handlers::get_employee_appointments),
        )
        .layer(middleware::from_fn(tenant_middleware))
        .with_state(state)
}
