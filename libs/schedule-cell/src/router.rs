use axum::{middleware, routing::get, Router};

use shared_utils::extractor::tenant_middleware;

use crate::handlers::{self, ScheduleState};

pub fn schedule_routes(state: ScheduleState) -> Router {
    Router::new()
        .route("/availability", get(handlers::compute_availability))
        .layer(middleware::from_fn(tenant_middleware))
        .with_state(state)
}
