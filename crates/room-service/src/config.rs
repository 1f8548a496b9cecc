//! Room service configuration.
//!
//! Configuration is loaded from environment variables. The token signing
//! secret is redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, DEFAULT_TOKEN_TTL, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3001";

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum accepted bcrypt cost factor.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum accepted bcrypt cost factor.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Default per-connection outbound queue size, in events.
pub const DEFAULT_CONNECTION_BUFFER: usize = 256;

/// Default age after which a room nobody has joined is deleted (1 hour).
pub const DEFAULT_PENDING_ROOM_TTL: Duration = Duration::from_secs(3600);

/// Default interval between pending room sweeps (1 minute).
pub const DEFAULT_PENDING_ROOM_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Minimum signing secret length for HS256 (32 bytes).
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Room service configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP/WebSocket bind address (default: "0.0.0.0:3001").
    pub bind_address: String,

    /// HS256 secret used to sign and verify user tokens.
    /// Protected by `SecretString` to prevent accidental logging.
    pub jwt_secret: SecretString,

    /// Lifetime of issued user tokens (default: 24h).
    pub token_ttl: Duration,

    /// Tolerated clock skew for token `iat` (default: 300s, max 600s).
    pub jwt_clock_skew: Duration,

    /// bcrypt cost for password hashing (default: 12, range 10-14).
    pub bcrypt_cost: u32,

    /// Outbound queue size per realtime connection (default: 256).
    pub connection_buffer: usize,

    /// Age after which a created but never joined room is deleted
    /// (default: 3600s).
    pub pending_room_ttl: Duration,

    /// How often pending rooms are checked (default: 60s).
    pub pending_room_sweep_interval: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("connection_buffer", &self.connection_buffer)
            .field("pending_room_ttl", &self.pending_room_ttl)
            .field(
                "pending_room_sweep_interval",
                &self.pending_room_sweep_interval,
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = SecretString::from(
            vars.get("JWT_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?
                .clone(),
        );

        if jwt_secret.expose_secret().len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} bytes"
            )));
        }

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let token_ttl = match vars.get("TOKEN_TTL_SECONDS") {
            Some(raw) => {
                let secs: u64 = parse_value("TOKEN_TTL_SECONDS", raw)?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue(
                        "TOKEN_TTL_SECONDS must be greater than 0".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TOKEN_TTL,
        };

        let jwt_clock_skew = match vars.get("JWT_CLOCK_SKEW_SECONDS") {
            Some(raw) => {
                let secs: u64 = parse_value("JWT_CLOCK_SKEW_SECONDS", raw)?;
                if secs == 0 || secs > MAX_CLOCK_SKEW.as_secs() {
                    return Err(ConfigError::InvalidValue(format!(
                        "JWT_CLOCK_SKEW_SECONDS must be between 1 and {}",
                        MAX_CLOCK_SKEW.as_secs()
                    )));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_CLOCK_SKEW,
        };

        let bcrypt_cost = match vars.get("BCRYPT_COST") {
            Some(raw) => {
                let cost: u32 = parse_value("BCRYPT_COST", raw)?;
                if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
                    return Err(ConfigError::InvalidValue(format!(
                        "BCRYPT_COST must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"
                    )));
                }
                cost
            }
            None => DEFAULT_BCRYPT_COST,
        };

        let connection_buffer = match vars.get("CONNECTION_BUFFER") {
            Some(raw) => {
                let size: usize = parse_value("CONNECTION_BUFFER", raw)?;
                if size == 0 {
                    return Err(ConfigError::InvalidValue(
                        "CONNECTION_BUFFER must be at least 1".to_string(),
                    ));
                }
                size
            }
            None => DEFAULT_CONNECTION_BUFFER,
        };

        let pending_room_ttl = match vars.get("PENDING_ROOM_TTL_SECONDS") {
            Some(raw) => positive_seconds("PENDING_ROOM_TTL_SECONDS", raw)?,
            None => DEFAULT_PENDING_ROOM_TTL,
        };

        let pending_room_sweep_interval = match vars.get("PENDING_ROOM_SWEEP_INTERVAL_SECONDS") {
            Some(raw) => positive_seconds("PENDING_ROOM_SWEEP_INTERVAL_SECONDS", raw)?,
            None => DEFAULT_PENDING_ROOM_SWEEP_INTERVAL,
        };

        Ok(Config {
            bind_address,
            jwt_secret,
            token_ttl,
            jwt_clock_skew,
            bcrypt_cost,
            connection_buffer,
            pending_room_ttl,
            pending_room_sweep_interval,
        })
    }
}

fn positive_seconds(name: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_value(name, raw)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(format!(
            "{name} must be greater than 0"
        )));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_value<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{name} has an invalid value")))
}
