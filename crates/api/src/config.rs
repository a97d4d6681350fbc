//! Application configuration

use std::env;

use messmarkt_billing::{LimitDefaults, RateLimitConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub public_url: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Redis (rate-limit counters); in-memory counters when unset
    pub redis_url: Option<String>,

    // Authentication
    pub api_key_hmac_secret: String,
    pub supabase_jwt_secret: String,

    // Stripe
    pub stripe_webhook_secret: String,
    pub stripe_webhook_tolerance_secs: i64,

    // Rate limiting
    pub api_rate_limit: RateLimitConfig,

    // Plan limits (`LIMIT_<TIER>_<KIND>` overrides)
    pub limit_defaults: LimitDefaults,

    // Feature flags
    pub enable_billing: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let rate_defaults = RateLimitConfig::default();

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Redis
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),

            // Authentication
            api_key_hmac_secret: {
                let secret = env::var("API_KEY_HMAC_SECRET")
                    .map_err(|_| ConfigError::Missing("API_KEY_HMAC_SECRET"))?;
                // HMAC key must be cryptographically strong
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "API_KEY_HMAC_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET").unwrap_or_default(),

            // Stripe
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            stripe_webhook_tolerance_secs: env::var("STRIPE_WEBHOOK_TOLERANCE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),

            // Rate limiting
            api_rate_limit: RateLimitConfig {
                requests_per_window: parse_positive(
                    "API_RATE_LIMIT_REQUESTS",
                    rate_defaults.requests_per_window,
                )?,
                window_secs: parse_positive(
                    "API_RATE_LIMIT_WINDOW_SECS",
                    rate_defaults.window_secs,
                )?,
            },

            limit_defaults: LimitDefaults::from_env(),

            // Feature flags
            enable_billing: env::var("ENABLE_BILLING")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        })
    }
}

fn parse_positive(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::Invalid(name)),
        },
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
