use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    /// Minutes each queued slot is assumed to take when estimating waits.
    pub queue_slot_minutes: i64,
    /// Simulated settlement delay of the mock payment gateway.
    pub payment_delay_ms: u64,
    pub alternatives_radius_km: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "chargebuddy.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            queue_slot_minutes: env::var("QUEUE_SLOT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(30),
            payment_delay_ms: env::var("PAYMENT_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            alternatives_radius_km: env::var("ALTERNATIVES_RADIUS_KM")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &f64| v.is_finite() && *v > 0.0)
                .unwrap_or(5.0),
        }
    }
}
