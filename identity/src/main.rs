//! Identity service entry-point.

use actix_web::web;
use tally_core::HealthState;
use tally_core::pool::{DbPool, PoolConfig};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use tally_identity::config::AppConfig;
use tally_identity::server::{ServerConfig, create_server};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;
    let pool = DbPool::new(PoolConfig::new(&config.database_url))
        .await
        .map_err(std::io::Error::other)?;

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, ServerConfig::new(&config, pool))?;
    server.await
}
