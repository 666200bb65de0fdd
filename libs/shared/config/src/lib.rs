use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_url: String,
    pub storage_service_key: String,
    /// Organization-wide slot step used by the availability calculator.
    pub slot_granularity_minutes: i64,
    /// Confirmation threads with no reply for this long are expired by the sweep.
    pub confirmation_expiry_hours: i64,
    pub sweep_interval_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            storage_url: env::var("STORAGE_URL")
                .unwrap_or_else(|_| {
                    warn!("STORAGE_URL not set, using empty value");
                    String::new()
                }),
            storage_service_key: env::var("STORAGE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("STORAGE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            slot_granularity_minutes: parse_env_i64("SLOT_GRANULARITY_MINUTES", 15),
            confirmation_expiry_hours: parse_env_i64("CONFIRMATION_EXPIRY_HOURS", 24),
            sweep_interval_seconds: parse_env_i64("SWEEP_INTERVAL_SECONDS", 300) as u64,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.storage_url.is_empty() && !self.storage_service_key.is_empty()
    }
}

fn parse_env_i64(name: &str, default: i64) -> i64 {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid integer, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}
