//! Reqwest-backed `TokenVerifier` adapter.
//!
//! For every inbound request the ledger mints a fresh short-lived internal
//! token, posts the client's external token to the identity service, and
//! adopts its verdict. The external token is never decoded locally; the
//! identity service's answer is authoritative.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tally_tokens::{HmacSecret, INTERNAL_TOKEN_TTL};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{TokenRejected, TokenVerifier};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    user_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct ValidateVerdict {
    valid: bool,
    #[serde(default)]
    user_id: Option<Uuid>,
}

fn verdict_to_principal(verdict: ValidateVerdict) -> Result<Uuid, TokenRejected> {
    match verdict {
        ValidateVerdict {
            valid: true,
            user_id: Some(user_id),
        } => Ok(user_id),
        ValidateVerdict { valid: true, .. } => {
            Err(TokenRejected::new("identity answered valid without a user id"))
        }
        _ => Err(TokenRejected::new("identity rejected the token")),
    }
}

/// HTTP client for the identity service's validation endpoint.
pub struct HttpTokenVerifier {
    client: Client,
    validate_url: Url,
    internal_secret: HmacSecret,
}

impl HttpTokenVerifier {
    /// Build a verifier with the default 5 second request timeout.
    ///
    /// # Errors
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(validate_url: Url, internal_secret: HmacSecret) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            validate_url,
            internal_secret,
        })
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Uuid, TokenRejected> {
        let internal = tally_tokens::mint_internal(&self.internal_secret, INTERNAL_TOKEN_TTL)
            .map_err(|err| TokenRejected::new(format!("internal token minting failed: {err}")))?;

        let response = self
            .client
            .post(self.validate_url.clone())
            .bearer_auth(internal)
            .json(&ValidateRequest { user_token: token })
            .send()
            .await
            .map_err(|err| {
                debug!(error = %err, "identity validation transport failed");
                TokenRejected::new(format!("identity unreachable: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenRejected::new(format!(
                "identity answered status {status}"
            )));
        }

        let verdict: ValidateVerdict = response.json().await.map_err(|err| {
            TokenRejected::new(format!("identity answer did not decode: {err}"))
        })?;
        verdict_to_principal(verdict)
    }
}
