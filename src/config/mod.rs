//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::util::time::{DEFAULT_TICK_RATE_HZ, MAX_TICK_RATE_HZ};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// HMAC secret used to verify player JWTs
    pub jwt_secret: String,

    /// Base URL of the match persistence service
    pub game_service_url: String,
    /// Optional bearer token for the match persistence service
    pub game_service_token: Option<String>,

    /// Simulation ticks per second for every session
    pub tick_rate_hz: u32,
    /// Capacity of each per-player inbound queue
    pub input_queue_capacity: usize,
    /// Capacity of each per-player outbound queue
    pub outbound_queue_capacity: usize,
    /// How long a session may wait with nobody connected
    pub pending_timeout: Duration,

    /// Allowed client origins for CORS ("*" for any)
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let tick_rate_hz: u32 = parse_or("TICK_RATE_HZ", DEFAULT_TICK_RATE_HZ)?;
        if tick_rate_hz == 0 || tick_rate_hz > MAX_TICK_RATE_HZ {
            return Err(ConfigError::Invalid {
                name: "TICK_RATE_HZ",
                value: tick_rate_hz.to_string(),
            });
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            jwt_secret: env::var("AUTH_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("AUTH_JWT_SECRET"))?,

            game_service_url: env::var("GAME_SERVICE_URL")
                .map_err(|_| ConfigError::Missing("GAME_SERVICE_URL"))?
                .trim_end_matches('/')
                .to_string(),
            game_service_token: env::var("GAME_SERVICE_TOKEN").ok().filter(|t| !t.is_empty()),

            tick_rate_hz,
            input_queue_capacity: parse_or("INPUT_QUEUE_CAPACITY", 32usize)?.max(1),
            outbound_queue_capacity: parse_or("OUTBOUND_QUEUE_CAPACITY", 64usize)?.max(1),
            pending_timeout: Duration::from_secs(parse_or("PENDING_TIMEOUT_SECS", 120u64)?),

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
        })
    }
}

/// Parse an optional numeric variable, using `default` when it is unset
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
impl Config {
    /// Configuration used by unit tests, no environment involved
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".parse().expect("static address"),
            log_level: "debug".to_string(),
            jwt_secret: "test-secret".to_string(),
            game_service_url: "http://127.0.0.1:9".to_string(),
            game_service_token: None,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            input_queue_capacity: 8,
            outbound_queue_capacity: 16,
            pending_timeout: Duration::from_secs(120),
            client_origin: "*".to_string(),
        }
    }
}
