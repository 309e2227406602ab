//! Remote-validation auth guard.
//!
//! The ledger never trusts external token claims directly; the identity
//! service's verdict is authoritative. Handlers call [`require_principal`]
//! first and work with the returned user id.

use actix_web::HttpRequest;
use tally_core::{Error, bearer_token};
use tracing::debug;
use uuid::Uuid;

use super::ApiResult;
use super::state::HttpState;

/// Resolve the principal for a protected ledger endpoint.
///
/// Any failure along the way (missing header, transport error towards
/// identity, an explicit rejection) collapses into `UNAUTHORIZED`.
pub async fn require_principal(req: &HttpRequest, state: &HttpState) -> ApiResult<Uuid> {
    let token = bearer_token(req)?;
    state.verifier.verify(token).await.map_err(|rejection| {
        debug!(reason = %rejection.reason, "external token rejected");
        Error::unauthorized("invalid or expired token")
    })
}
