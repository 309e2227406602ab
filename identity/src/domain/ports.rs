//! Ports implemented by the identity service's outbound adapters.

use async_trait::async_trait;

use super::{EmailAddress, Password, PersonName, User, UserId};

/// Errors raised by user repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserPersistenceError {
    #[error("user repository connection failed: {message}")]
    Connection { message: String },
    #[error("user repository query failed: {message}")]
    Query { message: String },
    #[error("email is already registered")]
    DuplicateEmail,
}

impl UserPersistenceError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Insert payload for a new user; the digest is already computed.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub id: UserId,
    pub email: EmailAddress,
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub password_digest: String,
}

/// A stored user together with its credential digest.
///
/// Only the login path sees this; the digest stops here and never reaches
/// a response type.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_digest: String,
}

/// Column-level changes applied by a profile update.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<PersonName>,
    pub last_name: Option<PersonName>,
    pub password_digest: Option<String>,
}

/// Port for user persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; a duplicate email maps to
    /// [`UserPersistenceError::DuplicateEmail`].
    async fn create(&self, record: &NewUserRecord) -> Result<User, UserPersistenceError>;

    /// Case-sensitive lookup by email, returning the digest for login.
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<StoredUser>, UserPersistenceError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserPersistenceError>;

    /// Apply changes and return the updated user, or `None` when absent.
    async fn update(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, UserPersistenceError>;

    /// Delete the user, reporting whether a row was removed.
    async fn delete(&self, id: UserId) -> Result<bool, UserPersistenceError>;

    /// List users ordered by creation time, newest first.
    async fn list(&self, limit: i64) -> Result<Vec<User>, UserPersistenceError>;
}

/// Errors raised by credential hashing adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("credential hashing failed: {message}")]
pub struct CredentialHashError {
    pub message: String,
}

impl CredentialHashError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Port for one-way password hashing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    /// Produce a salted digest in PHC string format.
    async fn hash(&self, password: &Password) -> Result<String, CredentialHashError>;

    /// Check a candidate password against a stored digest.
    async fn verify(
        &self,
        password: &str,
        digest: &str,
    ) -> Result<bool, CredentialHashError>;
}
