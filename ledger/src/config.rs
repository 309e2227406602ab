//! Process configuration, loaded once at startup.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use tally_tokens::HmacSecret;
use url::Url;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8082";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 10_000;

/// Errors raised while reading the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing { name })
}

fn millis(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(Duration::from_millis(default)),
        Ok(raw) => raw
            .parse()
            .map(Duration::from_millis)
            .map_err(|err: std::num::ParseIntError| ConfigError::Invalid {
                name,
                message: err.to_string(),
            }),
    }
}

/// Ledger service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Base URL of the identity service.
    pub identity_url: Url,
    /// Signs the internal tokens presented to identity.
    pub internal_secret: HmacSecret,
    /// How often the background sweeper reclaims expired idempotency rows.
    pub sweep_interval: Duration,
    pub lock_timeout: Duration,
    pub statement_timeout: Duration,
}

impl AppConfig {
    /// Read configuration from the environment.
    ///
    /// Required: `DATABASE_URL`, `IDENTITY_URL`, `INTERNAL_JWT_SECRET`.
    /// Optional: `LEDGER_BIND_ADDR` (default `0.0.0.0:8082`),
    /// `SWEEP_INTERVAL_SECS` (default 3600), `LOCK_TIMEOUT_MS` (default
    /// 5000), `STATEMENT_TIMEOUT_MS` (default 10000).
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("LEDGER_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned())
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::Invalid {
                name: "LEDGER_BIND_ADDR",
                message: err.to_string(),
            })?;

        let identity_url = required("IDENTITY_URL")?
            .parse()
            .map_err(|err: url::ParseError| ConfigError::Invalid {
                name: "IDENTITY_URL",
                message: err.to_string(),
            })?;

        let sweep_interval = match env::var("SWEEP_INTERVAL_SECS") {
            Err(_) => Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            Ok(raw) => raw.parse().map(Duration::from_secs).map_err(
                |err: std::num::ParseIntError| ConfigError::Invalid {
                    name: "SWEEP_INTERVAL_SECS",
                    message: err.to_string(),
                },
            )?,
        };

        Ok(Self {
            bind_addr,
            database_url: required("DATABASE_URL")?,
            identity_url,
            internal_secret: HmacSecret::from(required("INTERNAL_JWT_SECRET")?),
            sweep_interval,
            lock_timeout: millis("LOCK_TIMEOUT_MS", DEFAULT_LOCK_TIMEOUT_MS)?,
            statement_timeout: millis("STATEMENT_TIMEOUT_MS", DEFAULT_STATEMENT_TIMEOUT_MS)?,
        })
    }

    /// The identity endpoint external tokens are validated against.
    pub fn validate_url(&self) -> Result<Url, ConfigError> {
        self.identity_url
            .join("/api/v1/auth/validate-user-jwt")
            .map_err(|err| ConfigError::Invalid {
                name: "IDENTITY_URL",
                message: err.to_string(),
            })
    }
}
