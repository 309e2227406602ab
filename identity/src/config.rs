//! Process configuration, loaded once at startup.
//!
//! Secrets and addresses come from the environment here and nowhere else;
//! everything downstream receives explicit values.

use std::env;
use std::net::SocketAddr;

use tally_tokens::HmacSecret;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8081";

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

/// Identity service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Signs external tokens minted at login.
    pub external_secret: HmacSecret,
    /// Guards the peer-service validation endpoint.
    pub internal_secret: HmacSecret,
}

impl AppConfig {
    /// Read configuration from the environment.
    ///
    /// Required: `DATABASE_URL`, `JWT_SECRET`, `INTERNAL_JWT_SECRET`.
    /// Optional: `IDENTITY_BIND_ADDR` (default `0.0.0.0:8081`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("IDENTITY_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned())
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::Invalid {
                name: "IDENTITY_BIND_ADDR",
                message: err.to_string(),
            })?;

        Ok(Self {
            bind_addr,
            database_url: required("DATABASE_URL")?,
            external_secret: HmacSecret::from(required("JWT_SECRET")?),
            internal_secret: HmacSecret::from(required("INTERNAL_JWT_SECRET")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variables_are_reported_by_name() {
        let err = required("TALLY_TEST_UNSET_VARIABLE").expect_err("variable must be unset");
        assert!(err.to_string().contains("TALLY_TEST_UNSET_VARIABLE"));
    }
}
