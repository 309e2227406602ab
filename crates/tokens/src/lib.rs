//! Bearer-token contract shared by the identity and ledger services.
//!
//! Two token families cross service boundaries: **external** tokens minted
//! by the identity service at login and presented by clients, and
//! **internal** tokens a peer service mints to prove its identity when
//! calling the identity service's validation endpoint. Both are HS256 JWTs,
//! each keyed on its own secret. This crate owns the claim shapes and the
//! mint/verify functions so the two services cannot drift apart.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default lifetime of an external (end-user) token.
pub const EXTERNAL_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Default lifetime of an internal (service-to-service) token.
pub const INTERNAL_TOKEN_TTL: Duration = Duration::from_secs(60);

/// HMAC signing secret for one token family.
///
/// The `Debug` impl never prints the secret bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct HmacSecret(Vec<u8>);

impl HmacSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HmacSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HmacSecret(..)")
    }
}

impl From<String> for HmacSecret {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

/// Claims carried by an external token.
///
/// `sub` is the user's stable identifier; decoding enforces that it is a
/// well-formed UUID so downstream code never handles a free-form subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalClaims {
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by an internal token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalClaims {
    pub internal: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Failures raised while minting or verifying tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token's `exp` claim is in the past.
    #[error("token has expired")]
    Expired,
    /// The signature does not verify against the expected secret.
    #[error("token signature is invalid")]
    Invalid,
    /// The token is structurally broken or its claims fail validation.
    #[error("token is malformed: {reason}")]
    Malformed { reason: String },
    /// Signing failed while minting a token.
    #[error("token could not be minted: {reason}")]
    Mint { reason: String },
}

impl TokenError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

fn map_decode_error(error: jsonwebtoken::errors::Error) -> TokenError {
    match error.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::Invalid,
        _ => TokenError::malformed(error.to_string()),
    }
}

fn hs256_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}

fn timestamps(ttl: Duration) -> (i64, i64) {
    let iat = Utc::now().timestamp();
    (iat, iat + ttl.as_secs() as i64)
}

/// Mint an external token for the given user.
pub fn mint_external(
    secret: &HmacSecret,
    user_id: Uuid,
    email: &str,
    ttl: Duration,
) -> Result<String, TokenError> {
    let (iat, exp) = timestamps(ttl);
    let claims = ExternalClaims {
        sub: user_id,
        email: email.to_owned(),
        iat,
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| TokenError::Mint {
        reason: err.to_string(),
    })
}

/// Verify an external token and return its claims.
///
/// Rejects tokens with a bad signature, an expired `exp`, a non-UUID `sub`,
/// or an empty `email`.
pub fn verify_external(secret: &HmacSecret, token: &str) -> Result<ExternalClaims, TokenError> {
    let data = decode::<ExternalClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &hs256_validation(),
    )
    .map_err(map_decode_error)?;

    if data.claims.email.trim().is_empty() {
        return Err(TokenError::malformed("email claim must not be empty"));
    }
    Ok(data.claims)
}

/// Mint an internal token proving the caller is a peer service.
pub fn mint_internal(secret: &HmacSecret, ttl: Duration) -> Result<String, TokenError> {
    let (iat, exp) = timestamps(ttl);
    let claims = InternalClaims {
        internal: true,
        iat,
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| TokenError::Mint {
        reason: err.to_string(),
    })
}

/// Verify an internal token.
///
/// Rejects tokens whose `internal` flag is absent or false alongside the
/// usual signature and expiry checks.
pub fn verify_internal(secret: &HmacSecret, token: &str) -> Result<InternalClaims, TokenError> {
    let data = decode::<InternalClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &hs256_validation(),
    )
    .map_err(map_decode_error)?;

    if !data.claims.internal {
        return Err(TokenError::malformed("internal flag must be true"));
    }
    Ok(data.claims)
}
