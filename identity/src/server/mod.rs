//! Server construction and wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use tally_core::pool::DbPool;
use tally_core::{HealthState, Trace, health};

use crate::config::AppConfig;
use crate::domain::IdentityService;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{auth, users};
use crate::outbound::Argon2CredentialHasher;
use crate::outbound::persistence::DieselUserRepository;

/// Everything `create_server` needs, assembled from configuration.
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub state: HttpState,
}

impl ServerConfig {
    /// Wire the production adapters behind the domain service.
    pub fn new(config: &AppConfig, pool: DbPool) -> Self {
        let service = IdentityService::new(
            Arc::new(DieselUserRepository::new(pool)),
            Arc::new(Argon2CredentialHasher::new()),
            config.external_secret.clone(),
        );
        Self {
            bind_addr: config.bind_addr,
            state: HttpState::new(Arc::new(service), config.internal_secret.clone()),
        }
    }
}

/// Construct the HTTP server and mark the service ready once bound.
///
/// # Errors
/// Propagates [`std::io::Error`] when the socket cannot be bound.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let state = web::Data::new(config.state);
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_health_state.clone())
            .app_data(state.clone())
            .wrap(Trace)
            .service(
                web::scope("/api/v1")
                    .service(users::register)
                    .service(users::list_users)
                    .service(users::get_user)
                    .service(users::update_user)
                    .service(users::delete_user)
                    .service(auth::login)
                    .service(auth::validate_user_jwt),
            )
            .service(health::ready)
            .service(health::live)
    })
    .bind(config.bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}
