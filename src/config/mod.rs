use std::env;
use std::time::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub server: ServerConfig,
    pub sale: SaleConfig,
}

/// PostgreSQL pool configuration.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    /// Connection acquire timeout in seconds.
    pub connect_timeout: u64,
}

/// Redis pool configuration. Commands run with a short response timeout so
/// ephemeral-store outages fail fast instead of holding request workers.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub connect_timeout: u64,
    pub response_timeout: u64,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Sale mechanics: TTLs, wave pacing, purchase caps, rate limits, signing.
#[derive(Debug, Clone)]
pub struct SaleConfig {
    /// Waiting-room token lifetime in seconds.
    pub token_ttl_secs: u64,
    /// Admission grant lifetime in seconds.
    pub grant_ttl_secs: u64,
    /// Positions released per wave.
    pub wave_size: u64,
    /// Minimum seconds between wave advancements.
    pub wave_interval_secs: u64,
    /// Reservation hold lifetime in seconds.
    pub reservation_ttl_secs: i64,
    /// Maximum paid + held quantity per user per event.
    pub per_event_purchase_limit: i32,
    /// Recovery worker cycle interval in seconds.
    pub recovery_interval_secs: u64,
    /// Process-wide secret for QR signatures.
    pub qr_secret: String,
    /// Checkout session creations allowed per user per minute.
    pub session_rate_per_min: u32,
    /// Payment confirmations allowed per user per minute.
    pub confirm_rate_per_min: u32,
}

impl Config {
    /// Load configuration from the environment, falling back to development
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            postgres: PostgresConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/boxoffice".to_string()),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
                connect_timeout: env_parse("DATABASE_CONNECT_TIMEOUT", 30),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                connect_timeout: env_parse("REDIS_CONNECT_TIMEOUT", 5),
                response_timeout: env_parse("REDIS_RESPONSE_TIMEOUT", 5),
            },
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("PORT", 8080),
            },
            sale: SaleConfig {
                token_ttl_secs: env_parse("QUEUE_TOKEN_TTL_SECS", 3600),
                grant_ttl_secs: env_parse("ADMISSION_GRANT_TTL_SECS", 180),
                wave_size: env_parse("WAVE_SIZE", 100),
                wave_interval_secs: env_parse("WAVE_INTERVAL_SECS", 30),
                reservation_ttl_secs: env_parse("RESERVATION_TTL_SECS", 180),
                per_event_purchase_limit: env_parse("PER_EVENT_PURCHASE_LIMIT", 6),
                recovery_interval_secs: env_parse("RECOVERY_INTERVAL_SECS", 60),
                qr_secret: env::var("QR_SECRET")
                    .unwrap_or_else(|_| "dev-secret-change-in-production".to_string()),
                session_rate_per_min: env_parse("CHECKOUT_SESSION_RATE", 5),
                confirm_rate_per_min: env_parse("CHECKOUT_CONFIRM_RATE", 10),
            },
        }
    }
}

impl SaleConfig {
    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reservation_ttl_secs)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_interval_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        // Scope: only assert on keys the test environment leaves unset.
        std::env::remove_var("WAVE_SIZE");
        std::env::remove_var("RESERVATION_TTL_SECS");
        std::env::remove_var("PER_EVENT_PURCHASE_LIMIT");

        let config = Config::from_env();
        assert_eq!(config.sale.wave_size, 100);
        assert_eq!(config.sale.reservation_ttl_secs, 180);
        assert_eq!(config.sale.per_event_purchase_limit, 6);
        assert_eq!(config.sale.wave_interval_secs, 30);
        assert_eq!(config.sale.token_ttl_secs, 3600);
        assert_eq!(config.sale.grant_ttl_secs, 180);
        assert_eq!(config.sale.recovery_interval_secs, 60);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("BOXOFFICE_TEST_GARBAGE", "not-a-number");
        let value: u64 = env_parse("BOXOFFICE_TEST_GARBAGE", 7);
        assert_eq!(value, 7);
        std::env::remove_var("BOXOFFICE_TEST_GARBAGE");
    }
}
