//! Server construction, wiring, and the background sweeper.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use tally_core::pool::DbPool;
use tally_core::{HealthState, Trace, health};
use tracing::warn;

use crate::config::AppConfig;
use crate::domain::LedgerService;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{balance, status, transactions};
use crate::outbound::HttpTokenVerifier;
use crate::outbound::persistence::{DieselLedgerStore, StoreTuning};

/// Everything `create_server` needs, assembled from configuration.
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub state: HttpState,
    pub sweep_interval: Duration,
}

impl ServerConfig {
    /// Wire the production adapters behind the domain service.
    ///
    /// # Errors
    /// Fails when the identity URL cannot be joined or the HTTP client
    /// cannot be built.
    pub fn new(config: &AppConfig, pool: DbPool) -> std::io::Result<Self> {
        let store = DieselLedgerStore::new(pool).with_tuning(StoreTuning {
            lock_timeout: config.lock_timeout,
            statement_timeout: config.statement_timeout,
        });
        let verifier = HttpTokenVerifier::new(
            config.validate_url().map_err(std::io::Error::other)?,
            config.internal_secret.clone(),
        )
        .map_err(std::io::Error::other)?;

        Ok(Self {
            bind_addr: config.bind_addr,
            state: HttpState::new(
                Arc::new(LedgerService::new(Arc::new(store))),
                Arc::new(verifier),
            ),
            sweep_interval: config.sweep_interval,
        })
    }
}

/// Spawn the periodic idempotency sweep.
///
/// Off the hot path: the first sweep runs one full interval after startup,
/// and failures are logged rather than propagated.
fn spawn_sweeper(ledger: Arc<LedgerService>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = ledger.sweep_expired().await {
                warn!(error = %err, "idempotency sweep failed");
            }
        }
    });
}

/// Construct the HTTP server and mark the service ready once bound.
///
/// # Errors
/// Propagates [`std::io::Error`] when the socket cannot be bound.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    spawn_sweeper(config.state.ledger.clone(), config.sweep_interval);

    let state = web::Data::new(config.state);
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_health_state.clone())
            .app_data(state.clone())
            .wrap(Trace)
            .service(
                web::scope("/api/v1")
                    .service(transactions::post_transaction)
                    .service(transactions::list_transactions)
                    .service(balance::get_balance)
                    .service(status::get_status),
            )
            .service(health::ready)
            .service(health::live)
    })
    .bind(config.bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}
