use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use crate::services::conversation::ConversationService;

/// Background expiry sweep. The conversation engine itself never times
/// threads out; this loop is the one clock-driven transition in the system.
/// Spawned once by the API binary.
pub async fn run_expiry_sweep(
    service: Arc<ConversationService>,
    expiry: chrono::Duration,
    interval: Duration,
) {
    info!(
        "Confirmation expiry sweep running every {:?}, expiring threads older than {}h",
        interval,
        expiry.num_hours()
    );

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let cutoff = Utc::now() - expiry;
        if let Err(err) = service.expire_stale(cutoff).await {
            error!("Confirmation expiry sweep failed: {}", err);
        }
    }
}
