use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::services::booking::BookingService;
use appointment_cell::services::busy::BusyIntervalCollector;
use appointment_cell::store::RestAppointmentStore;
use billing_cell::handlers::BillingState;
use billing_cell::services::charges::ChargeCoordinator;
use billing_cell::store::RestChargeStore;
use confirmation_cell::handlers::ConversationState;
use confirmation_cell::services::conversation::{ConversationService, TracingSender};
use confirmation_cell::services::sweeper::run_expiry_sweep;
use confirmation_cell::store::RestNotificationStore;
use schedule_cell::handlers::ScheduleState;
use schedule_cell::services::availability::AvailabilityService;
use schedule_cell::store::RestScheduleStore;
use shared_config::AppConfig;
use shared_database::rest::RestStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking API server");

    // Load configuration and compose the cells
    let config = AppConfig::from_env();
    let rest = Arc::new(RestStore::new(&config));

    let schedule_store = Arc::new(RestScheduleStore::new(rest.clone()));
    let appointment_store = Arc::new(RestAppointmentStore::new(rest.clone()));
    let charge_store = Arc::new(RestChargeStore::new(rest.clone()));
    let notification_store = Arc::new(RestNotificationStore::new(rest));

    let busy = Arc::new(BusyIntervalCollector::new(appointment_store.clone()));
    let availability = Arc::new(AvailabilityService::new(
        schedule_store.clone(),
        schedule_store,
        busy,
        config.slot_granularity_minutes,
    ));
    let charges = Arc::new(ChargeCoordinator::new(charge_store));
    let booking = Arc::new(BookingService::new(
        appointment_store,
        availability.clone(),
        charges.clone(),
    ));
    charges.set_appointment_hook(booking.clone());

    let conversation = Arc::new(ConversationService::new(
        notification_store,
        booking.clone(),
        availability.clone(),
        Arc::new(TracingSender),
    ));

    // Expiry sweep: the only clock-driven transition in the system
    tokio::spawn(run_expiry_sweep(
        conversation.clone(),
        chrono::Duration::hours(config.confirmation_expiry_hours),
        Duration::from_secs(config.sweep_interval_seconds),
    ));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(
        ScheduleState { availability },
        AppointmentState { booking },
        BillingState { charges },
        ConversationState { conversation },
    )
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    )
    .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind listen address")?;
    axum::serve(listener, app)
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}
