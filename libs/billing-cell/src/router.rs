use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::tenant_middleware;

use crate::handlers::{self, BillingState};

pub fn billing_routes(state: BillingState) -> Router {
    Router::new()
        .route("/charges", post(handlers::create_charges))
        .route("/charges/{charge_id}", get(handlers::get_charge))
        .route("/charges/{charge_id}/pay", post(handlers::process_payment))
        .route("/charges/{charge_id}/refund", post(handlers::refund_charge))
        .route(
            "/appointments/{appointment_id}/charges",
            get(handlers::list_appointment_charges),
        )
        .layer(middleware::from_fn(tenant_middleware))
        .with_state(state)
}
