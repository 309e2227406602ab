//! PostgreSQL-backed `UserRepository` implementation.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tally_core::pool::{DbPool, PoolError};
use tracing::debug;

use crate::domain::ports::{
    NewUserRecord, ProfileChanges, StoredUser, UserPersistenceError, UserRepository,
};
use crate::domain::{EmailAddress, PersonName, User, UserId};

use super::models::{NewUserRow, UserChangeset, UserRow};
use super::schema::users;

/// Diesel adapter for user persistence.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UserPersistenceError {
    UserPersistenceError::connection(error.to_string())
}

fn map_diesel_error(error: diesel::result::Error) -> UserPersistenceError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "user query failed");
        }
        other => debug!(error = %other, "user query failed"),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            UserPersistenceError::DuplicateEmail
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            UserPersistenceError::connection("database connection closed")
        }
        _ => UserPersistenceError::query("database error"),
    }
}

/// Rebuild a domain user from a row, revalidating the stored fields.
///
/// Rows that no longer satisfy the domain invariants (for example a name
/// shortened by a manual fix-up) surface as query errors rather than
/// panics.
fn row_to_user(row: &UserRow) -> Result<User, UserPersistenceError> {
    let email = EmailAddress::new(&row.email)
        .map_err(|err| UserPersistenceError::query(format!("corrupt email column: {err}")))?;
    let first_name = PersonName::new(&row.first_name)
        .map_err(|err| UserPersistenceError::query(format!("corrupt first_name column: {err}")))?;
    let last_name = PersonName::new(&row.last_name)
        .map_err(|err| UserPersistenceError::query(format!("corrupt last_name column: {err}")))?;
    Ok(User {
        id: UserId::new(row.id),
        email,
        first_name,
        last_name,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn create(&self, record: &NewUserRecord) -> Result<User, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row = NewUserRow {
            id: record.id.as_uuid(),
            email: record.email.as_str(),
            password_hash: &record.password_digest,
            first_name: record.first_name.as_str(),
            last_name: record.last_name.as_str(),
        };

        let inserted: UserRow = diesel::insert_into(users::table)
            .values(&row)
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_user(&inserted)
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<StoredUser>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<UserRow> = users::table
            .filter(users::email.eq(email.as_str()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(|row| {
            Ok(StoredUser {
                user: row_to_user(&row)?,
                password_digest: row.password_hash,
            })
        })
        .transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<UserRow> = users::table
            .find(id.as_uuid())
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn update(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let changeset = UserChangeset {
            first_name: changes.first_name.as_ref().map(PersonName::as_str),
            last_name: changes.last_name.as_ref().map(PersonName::as_str),
            password_hash: changes.password_digest.as_deref(),
            updated_at: Utc::now(),
        };

        let row: Option<UserRow> = diesel::update(users::table.find(id.as_uuid()))
            .set(&changeset)
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn delete(&self, id: UserId) -> Result<bool, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted = diesel::delete(users::table.find(id.as_uuid()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn list(&self, limit: i64) -> Result<Vec<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<UserRow> = users::table
            .order(users::created_at.desc())
            .limit(limit)
            .select(UserRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.iter().map(row_to_user).collect()
    }
}
