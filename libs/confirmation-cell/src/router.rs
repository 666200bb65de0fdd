use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::tenant_middleware;

use crate::handlers::{self, ConversationState};

/// Webhook-facing routes are keyed by (phone, channel instance); the
/// channel instance identifies the tenant, so no tenant header applies.
/// Opening a thread is an internal operation and stays behind the tenant
/// middleware.
pub fn confirmation_routes(state: ConversationState) -> Router {
    let webhook_routes = Router::new()
        .route("/webhooks/messaging", post(handlers::receive_webhook))
        .route("/pending", get(handlers::get_pending_confirmation))
        .route(
            "/{notification_id}/response",
            post(handlers::record_response),
        )
        .route(
            "/{notification_id}/desired-date",
            post(handlers::set_desired_date),
        )
        .route(
            "/{notification_id}/select-slot",
            post(handlers::select_time_slot),
        )
        .route(
            "/{notification_id}/complete",
            post(handlers::complete_confirmation),
        );

    let tenant_routes = Router::new()
        .route("/", post(handlers::open_confirmation))
        .layer(middleware::from_fn(tenant_middleware));

    Router::new()
        .merge(webhook_routes)
        .merge(tenant_routes)
        .with_state(state)
}
