//! Account service: registration, login, profile management, and external
//! token validation on behalf of peer services.

use std::sync::Arc;
use std::time::Duration;

use tally_core::{ApiResult, Error};
use tally_tokens::{EXTERNAL_TOKEN_TTL, HmacSecret, TokenError};
use tracing::{debug, info};

use super::ports::{
    CredentialHashError, CredentialHasher, NewUserRecord, ProfileChanges, UserPersistenceError,
    UserRepository,
};
use super::{EmailAddress, ProfileUpdate, Registration, User, UserId};

/// Maximum rows returned by the user listing.
const USERS_LIST_MAX: i64 = 100;

/// Successful login: the user view plus a freshly minted external token.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
}

/// Outcome of validating an external token for a peer service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValidation {
    pub valid: bool,
    pub user_id: Option<UserId>,
}

impl TokenValidation {
    fn rejected() -> Self {
        Self {
            valid: false,
            user_id: None,
        }
    }
}

/// Core identity operations, independent of the HTTP layer.
pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
    external_secret: HmacSecret,
    token_ttl: Duration,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn CredentialHasher>,
        external_secret: HmacSecret,
    ) -> Self {
        Self {
            users,
            hasher,
            external_secret,
            token_ttl: EXTERNAL_TOKEN_TTL,
        }
    }

    #[cfg(test)]
    fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Register a new user. Duplicate emails surface as `EMAIL_CONFLICT`.
    pub async fn register(&self, registration: Registration) -> ApiResult<User> {
        let digest = self
            .hasher
            .hash(&registration.password)
            .await
            .map_err(map_hash_error)?;

        let record = NewUserRecord {
            id: UserId::random(),
            email: registration.email,
            first_name: registration.first_name,
            last_name: registration.last_name,
            password_digest: digest,
        };

        let user = self
            .users
            .create(&record)
            .await
            .map_err(map_user_persistence_error)?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Authenticate credentials and mint an external token.
    ///
    /// Unknown email, malformed email, and wrong password all collapse into
    /// the same `UNAUTHORIZED` answer so the endpoint does not oracle which
    /// addresses exist.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginOutcome> {
        let Ok(email) = EmailAddress::new(email) else {
            return Err(invalid_credentials());
        };
        let Some(stored) = self
            .users
            .find_by_email(&email)
            .await
            .map_err(map_user_persistence_error)?
        else {
            return Err(invalid_credentials());
        };

        let matches = self
            .hasher
            .verify(password, &stored.password_digest)
            .await
            .map_err(map_hash_error)?;
        if !matches {
            return Err(invalid_credentials());
        }

        let user = stored.user;
        let access_token = tally_tokens::mint_external(
            &self.external_secret,
            user.id.as_uuid(),
            user.email.as_str(),
            self.token_ttl,
        )
        .map_err(|err| Error::internal(format!("token minting failed: {err}")))?;

        info!(user_id = %user.id, "login succeeded");
        Ok(LoginOutcome { user, access_token })
    }

    /// Resolve the principal for a locally presented external token.
    pub fn authenticate(&self, token: &str) -> ApiResult<UserId> {
        match tally_tokens::verify_external(&self.external_secret, token) {
            Ok(claims) => Ok(UserId::new(claims.sub)),
            Err(err) => {
                debug!(reason = %err, "external token rejected");
                Err(Error::unauthorized("invalid or expired token"))
            }
        }
    }

    /// Validate an external token on behalf of a peer service.
    ///
    /// Never fails: a broken token is a `valid: false` answer, not an error.
    pub fn validate_token(&self, user_token: &str) -> TokenValidation {
        match tally_tokens::verify_external(&self.external_secret, user_token) {
            Ok(claims) => TokenValidation {
                valid: true,
                user_id: Some(UserId::new(claims.sub)),
            },
            Err(TokenError::Expired) => {
                debug!("peer validation: token expired");
                TokenValidation::rejected()
            }
            Err(err) => {
                debug!(reason = %err, "peer validation: token rejected");
                TokenValidation::rejected()
            }
        }
    }

    /// Fetch a profile; item access is restricted to the owner.
    pub async fn fetch(&self, principal: UserId, target: UserId) -> ApiResult<User> {
        ensure_self_access(principal, target)?;
        self.users
            .find_by_id(target)
            .await
            .map_err(map_user_persistence_error)?
            .ok_or_else(|| Error::not_found("user not found"))
    }

    /// Apply a self-update, hashing a replacement password when present.
    pub async fn update(
        &self,
        principal: UserId,
        target: UserId,
        update: ProfileUpdate,
    ) -> ApiResult<User> {
        ensure_self_access(principal, target)?;
        if update.is_empty() {
            return Err(Error::invalid_request("update must change at least one field"));
        }

        let password_digest = match &update.password {
            Some(password) => Some(self.hasher.hash(password).await.map_err(map_hash_error)?),
            None => None,
        };
        let changes = ProfileChanges {
            first_name: update.first_name,
            last_name: update.last_name,
            password_digest,
        };

        self.users
            .update(target, &changes)
            .await
            .map_err(map_user_persistence_error)?
            .ok_or_else(|| Error::not_found("user not found"))
    }

    /// Delete the principal's own account.
    pub async fn remove(&self, principal: UserId, target: UserId) -> ApiResult<()> {
        ensure_self_access(principal, target)?;
        let deleted = self
            .users
            .delete(target)
            .await
            .map_err(map_user_persistence_error)?;
        if !deleted {
            return Err(Error::not_found("user not found"));
        }
        info!(user_id = %target, "user deleted");
        Ok(())
    }

    /// List registered users, newest first.
    pub async fn list(&self) -> ApiResult<Vec<User>> {
        self.users
            .list(USERS_LIST_MAX)
            .await
            .map_err(map_user_persistence_error)
    }
}

fn ensure_self_access(principal: UserId, target: UserId) -> ApiResult<()> {
    if principal != target {
        return Err(Error::forbidden("users may only access their own record"));
    }
    Ok(())
}

fn invalid_credentials() -> Error {
    Error::unauthorized("invalid credentials")
}

fn map_user_persistence_error(error: UserPersistenceError) -> Error {
    match error {
        UserPersistenceError::Connection { message } => {
            Error::service_unavailable(format!("user store unavailable: {message}"))
        }
        UserPersistenceError::Query { message } => {
            Error::internal(format!("user store error: {message}"))
        }
        UserPersistenceError::DuplicateEmail => {
            Error::email_conflict("email is already registered")
        }
    }
}

fn map_hash_error(error: CredentialHashError) -> Error {
    Error::internal(format!("credential hashing failed: {error}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use rstest::rstest;
    use tally_core::ErrorCode;

    use super::*;
    use crate::domain::ports::StoredUser;
    use crate::domain::{Password, PersonName};

    const DIGEST: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$ZmFrZWRpZ2VzdA";

    /// In-memory repository backing the service tests.
    #[derive(Default)]
    struct StubUserRepository {
        rows: Mutex<Vec<StoredUser>>,
        fail_with: Option<UserPersistenceError>,
    }

    impl StubUserRepository {
        fn with_user(user: User, digest: &str) -> Self {
            Self {
                rows: Mutex::new(vec![StoredUser {
                    user,
                    password_digest: digest.to_owned(),
                }]),
                fail_with: None,
            }
        }

        fn failing(error: UserPersistenceError) -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
                fail_with: Some(error),
            }
        }

        fn check(&self) -> Result<(), UserPersistenceError> {
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl UserRepository for StubUserRepository {
        async fn create(&self, record: &NewUserRecord) -> Result<User, UserPersistenceError> {
            self.check()?;
            let mut rows = self.rows.lock().expect("rows lock");
            if rows.iter().any(|r| r.user.email == record.email) {
                return Err(UserPersistenceError::DuplicateEmail);
            }
            let now = Utc::now();
            let user = User {
                id: record.id,
                email: record.email.clone(),
                first_name: record.first_name.clone(),
                last_name: record.last_name.clone(),
                created_at: now,
                updated_at: now,
            };
            rows.push(StoredUser {
                user: user.clone(),
                password_digest: record.password_digest.clone(),
            });
            Ok(user)
        }

        async fn find_by_email(
            &self,
            email: &EmailAddress,
        ) -> Result<Option<StoredUser>, UserPersistenceError> {
            self.check()?;
            let rows = self.rows.lock().expect("rows lock");
            Ok(rows.iter().find(|r| &r.user.email == email).cloned())
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserPersistenceError> {
            self.check()?;
            let rows = self.rows.lock().expect("rows lock");
            Ok(rows.iter().find(|r| r.user.id == id).map(|r| r.user.clone()))
        }

        async fn update(
            &self,
            id: UserId,
            changes: &ProfileChanges,
        ) -> Result<Option<User>, UserPersistenceError> {
            self.check()?;
            let mut rows = self.rows.lock().expect("rows lock");
            let Some(row) = rows.iter_mut().find(|r| r.user.id == id) else {
                return Ok(None);
            };
            if let Some(name) = &changes.first_name {
                row.user.first_name = name.clone();
            }
            if let Some(name) = &changes.last_name {
                row.user.last_name = name.clone();
            }
            if let Some(digest) = &changes.password_digest {
                row.password_digest = digest.clone();
            }
            row.user.updated_at = Utc::now();
            Ok(Some(row.user.clone()))
        }

        async fn delete(&self, id: UserId) -> Result<bool, UserPersistenceError> {
            self.check()?;
            let mut rows = self.rows.lock().expect("rows lock");
            let before = rows.len();
            rows.retain(|r| r.user.id != id);
            Ok(rows.len() < before)
        }

        async fn list(&self, limit: i64) -> Result<Vec<User>, UserPersistenceError> {
            self.check()?;
            let rows = self.rows.lock().expect("rows lock");
            Ok(rows
                .iter()
                .take(limit as usize)
                .map(|r| r.user.clone())
                .collect())
        }
    }

    /// Hasher that prefixes instead of hashing so tests stay fast.
    struct StubHasher;

    #[async_trait]
    impl CredentialHasher for StubHasher {
        async fn hash(&self, password: &Password) -> Result<String, CredentialHashError> {
            Ok(format!("digest:{}", password.expose()))
        }

        async fn verify(&self, password: &str, digest: &str) -> Result<bool, CredentialHashError> {
            Ok(digest == format!("digest:{password}"))
        }
    }

    fn secret() -> HmacSecret {
        HmacSecret::new("identity-test-secret")
    }

    fn service(repo: StubUserRepository) -> IdentityService {
        IdentityService::new(Arc::new(repo), Arc::new(StubHasher), secret())
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: EmailAddress::new(email).expect("valid email"),
            first_name: PersonName::new("Ada").expect("valid name"),
            last_name: PersonName::new("Lovelace").expect("valid name"),
            password: Password::new("correct-horse").expect("valid password"),
        }
    }

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: UserId::random(),
            email: EmailAddress::new("ada@example.com").expect("valid email"),
            first_name: PersonName::new("Ada").expect("valid name"),
            last_name: PersonName::new("Lovelace").expect("valid name"),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trips() {
        let svc = service(StubUserRepository::default());
        let user = svc
            .register(registration("ada@example.com"))
            .await
            .expect("registration should succeed");

        let outcome = svc
            .login("ada@example.com", "correct-horse")
            .await
            .expect("login should succeed");
        assert_eq!(outcome.user.id, user.id);

        let principal = svc
            .authenticate(&outcome.access_token)
            .expect("minted token should authenticate");
        assert_eq!(principal, user.id);
    }

    #[tokio::test]
    async fn duplicate_email_maps_to_conflict() {
        let svc = service(StubUserRepository::default());
        svc.register(registration("ada@example.com"))
            .await
            .expect("first registration should succeed");

        let err = svc
            .register(registration("ada@example.com"))
            .await
            .expect_err("second registration must fail");
        assert_eq!(err.code(), ErrorCode::EmailConflict);
    }

    #[rstest]
    #[case::wrong_password("ada@example.com", "wrong-password")]
    #[case::unknown_email("nobody@example.com", "correct-horse")]
    #[case::malformed_email("not-an-email", "correct-horse")]
    #[tokio::test]
    async fn bad_credentials_are_unauthorized(#[case] email: &str, #[case] password: &str) {
        let svc = service(StubUserRepository::default());
        svc.register(registration("ada@example.com"))
            .await
            .expect("registration should succeed");

        let err = svc.login(email, password).await.expect_err("login must fail");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(err.message(), "invalid credentials");
    }

    #[tokio::test]
    async fn validate_token_accepts_fresh_and_rejects_foreign_tokens() {
        let svc = service(StubUserRepository::default());
        let user = svc
            .register(registration("ada@example.com"))
            .await
            .expect("registration should succeed");
        let outcome = svc
            .login("ada@example.com", "correct-horse")
            .await
            .expect("login should succeed");

        let validation = svc.validate_token(&outcome.access_token);
        assert_eq!(validation.user_id, Some(user.id));
        assert!(validation.valid);

        let foreign = tally_tokens::mint_external(
            &HmacSecret::new("some-other-secret"),
            user.id.as_uuid(),
            "ada@example.com",
            Duration::from_secs(60),
        )
        .expect("foreign token should mint");
        assert_eq!(svc.validate_token(&foreign), TokenValidation::rejected());
    }

    #[tokio::test]
    async fn expired_tokens_fail_validation() {
        let svc = service(StubUserRepository::default()).with_token_ttl(Duration::ZERO);
        svc.register(registration("ada@example.com"))
            .await
            .expect("registration should succeed");
        let outcome = svc
            .login("ada@example.com", "correct-horse")
            .await
            .expect("login should succeed");

        // ttl 0 makes exp == iat, which leeway-free validation rejects once
        // the clock ticks past the issue second.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!svc.validate_token(&outcome.access_token).valid);
    }

    #[tokio::test]
    async fn fetch_enforces_self_access() {
        let user = sample_user();
        let svc = service(StubUserRepository::with_user(user.clone(), DIGEST));

        let fetched = svc
            .fetch(user.id, user.id)
            .await
            .expect("owner fetch should succeed");
        assert_eq!(fetched.id, user.id);

        let err = svc
            .fetch(UserId::random(), user.id)
            .await
            .expect_err("foreign fetch must fail");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn update_rejects_empty_changes_and_applies_names() {
        let user = sample_user();
        let svc = service(StubUserRepository::with_user(user.clone(), DIGEST));

        let err = svc
            .update(user.id, user.id, ProfileUpdate::default())
            .await
            .expect_err("empty update must fail");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);

        let update = ProfileUpdate {
            first_name: Some(PersonName::new("Augusta").expect("valid name")),
            ..ProfileUpdate::default()
        };
        let updated = svc
            .update(user.id, user.id, update)
            .await
            .expect("update should succeed");
        assert_eq!(updated.first_name.as_str(), "Augusta");
    }

    #[tokio::test]
    async fn remove_reports_missing_users() {
        let user = sample_user();
        let svc = service(StubUserRepository::with_user(user.clone(), DIGEST));

        svc.remove(user.id, user.id)
            .await
            .expect("delete should succeed");
        let err = svc
            .remove(user.id, user.id)
            .await
            .expect_err("second delete must fail");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn connection_failures_surface_as_service_unavailable() {
        let svc = service(StubUserRepository::failing(
            UserPersistenceError::connection("db unreachable"),
        ));
        let err = svc.list().await.expect_err("list must fail");
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }
}
