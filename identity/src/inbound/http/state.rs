//! Shared HTTP adapter state.

use std::sync::Arc;

use tally_tokens::HmacSecret;

use crate::domain::IdentityService;

/// Dependency bundle for identity HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub service: Arc<IdentityService>,
    /// Secret guarding the peer-service validation endpoint.
    pub internal_secret: HmacSecret,
}

impl HttpState {
    pub fn new(service: Arc<IdentityService>, internal_secret: HmacSecret) -> Self {
        Self {
            service,
            internal_secret,
        }
    }
}
