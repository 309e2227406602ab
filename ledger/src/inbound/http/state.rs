//! Shared HTTP adapter state.

use std::sync::Arc;

use crate::domain::LedgerService;
use crate::domain::ports::TokenVerifier;

/// Dependency bundle for ledger HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub ledger: Arc<LedgerService>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl HttpState {
    pub fn new(ledger: Arc<LedgerService>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { ledger, verifier }
    }
}
