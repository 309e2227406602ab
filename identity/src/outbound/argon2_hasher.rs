//! Argon2id credential hashing adapter.
//!
//! Hashing is CPU-bound and takes tens of milliseconds, so both
//! operations run on the blocking thread pool to keep request workers
//! responsive.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use async_trait::async_trait;

use crate::domain::Password;
use crate::domain::ports::{CredentialHashError, CredentialHasher};

/// Argon2id hasher with the crate's default parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2CredentialHasher;

impl Argon2CredentialHasher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialHasher for Argon2CredentialHasher {
    async fn hash(&self, password: &Password) -> Result<String, CredentialHashError> {
        let password = password.expose().to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|digest| digest.to_string())
                .map_err(|err| CredentialHashError::new(err.to_string()))
        })
        .await
        .map_err(|err| CredentialHashError::new(format!("hashing task failed: {err}")))?
    }

    async fn verify(&self, password: &str, digest: &str) -> Result<bool, CredentialHashError> {
        let password = password.to_owned();
        let digest = digest.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&digest)
                .map_err(|err| CredentialHashError::new(format!("stored digest unreadable: {err}")))?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(|err| CredentialHashError::new(format!("verification task failed: {err}")))?
    }
}
