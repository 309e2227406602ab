//! PostgreSQL-backed `LedgerStore` implementation.
//!
//! `post_transaction` runs the full write protocol inside one database
//! transaction under serializable isolation:
//!
//! 1. apply `SET LOCAL` lock and statement timeouts,
//! 2. probe (or reserve) the idempotency key,
//! 3. read the account snapshot,
//! 4. check the proposed balance,
//! 5. append to the transaction log,
//! 6. upsert the snapshot in a single statement,
//! 7. finalize the idempotency record,
//! 8. commit.
//!
//! Contention is resolved entirely by Postgres: a concurrent writer on the
//! same user surfaces as a serialization failure (SQL state 40001) or a
//! unique violation on the reservation insert, and both are mapped to
//! retryable errors for the service-level loop. No application locks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tally_core::pool::{DbPool, PoolError};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{DbStatus, LedgerStore, LedgerStoreError, PostOutcome};
use crate::domain::{
    FINALIZED_RETENTION, IdempotencyKey, PENDING_RETENTION, PENDING_SENTINEL, PostingRequest,
    Transaction, TransactionKind, TransactionReceipt,
};

use super::models::{
    IdempotencyKeyRow, NewAccountRow, NewIdempotencyKeyRow, NewTransactionRow, TransactionRow,
};
use super::schema::{accounts, idempotency_keys, transactions};

/// Per-transaction database timeouts.
#[derive(Debug, Clone, Copy)]
pub struct StoreTuning {
    pub lock_timeout: Duration,
    pub statement_timeout: Duration,
}

impl Default for StoreTuning {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(10),
        }
    }
}

/// Diesel adapter for ledger persistence.
#[derive(Clone)]
pub struct DieselLedgerStore {
    pool: DbPool,
    tuning: StoreTuning,
}

impl DieselLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            tuning: StoreTuning::default(),
        }
    }

    #[must_use]
    pub fn with_tuning(mut self, tuning: StoreTuning) -> Self {
        self.tuning = tuning;
        self
    }
}

fn map_pool_error(error: PoolError) -> LedgerStoreError {
    LedgerStoreError::connection(error.to_string())
}

impl From<diesel::result::Error> for LedgerStoreError {
    fn from(error: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};

        match error {
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
                LedgerStoreError::serialization(info.message().to_owned())
            }
            // The only unique columns touched by the protocol are the
            // reservation key and the snapshot's user_id, and the snapshot
            // goes through ON CONFLICT; a violation is a reservation race.
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                LedgerStoreError::ReservationBusy
            }
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
                LedgerStoreError::connection("database connection closed")
            }
            DieselError::DatabaseError(kind, info) => {
                debug!(?kind, message = info.message(), "ledger query failed");
                LedgerStoreError::query("database error")
            }
            other => {
                debug!(error = %other, "ledger query failed");
                LedgerStoreError::query("database error")
            }
        }
    }
}

fn retention(window: Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX)
}

fn row_to_transaction(row: TransactionRow) -> Result<Transaction, LedgerStoreError> {
    let kind: TransactionKind = row
        .kind
        .parse()
        .map_err(|_| LedgerStoreError::query(format!("corrupt kind column: {}", row.kind)))?;
    Ok(Transaction {
        id: row.id,
        user_id: row.user_id,
        kind,
        amount: row.amount,
        idempotency_key: row.idempotency_key,
        created_at: row.created_at,
    })
}

async fn apply_local_timeouts(
    conn: &mut AsyncPgConnection,
    tuning: StoreTuning,
) -> Result<(), LedgerStoreError> {
    // SET LOCAL scopes both settings to the enclosing transaction.
    diesel::sql_query(format!(
        "SET LOCAL lock_timeout = {}",
        tuning.lock_timeout.as_millis()
    ))
    .execute(conn)
    .await?;
    diesel::sql_query(format!(
        "SET LOCAL statement_timeout = {}",
        tuning.statement_timeout.as_millis()
    ))
    .execute(conn)
    .await?;
    Ok(())
}

/// Outcome of the idempotency probe.
enum Probe {
    /// A finalized record exists; replay its stored receipt.
    Replay(TransactionReceipt),
    /// The key is now reserved for this transaction.
    Reserved,
}

async fn probe_reservation(
    conn: &mut AsyncPgConnection,
    key: &IdempotencyKey,
    now: DateTime<Utc>,
) -> Result<Probe, LedgerStoreError> {
    let existing: Option<IdempotencyKeyRow> = idempotency_keys::table
        .filter(idempotency_keys::key.eq(key.as_str()))
        .select(IdempotencyKeyRow::as_select())
        .first(conn)
        .await
        .optional()?;

    match existing {
        // Expired rows are dead regardless of content; reclaim in place.
        Some(row) if row.expires_at <= now => {
            diesel::update(idempotency_keys::table.find(row.id))
                .set((
                    idempotency_keys::response.eq(PENDING_SENTINEL),
                    idempotency_keys::created_at.eq(now),
                    idempotency_keys::expires_at.eq(now + retention(PENDING_RETENTION)),
                ))
                .execute(conn)
                .await?;
            Ok(Probe::Reserved)
        }
        // A live reservation: another writer holds the key. Retryable;
        // expiry or the sweeper clears a stale one.
        Some(row) if row.response == PENDING_SENTINEL => Err(LedgerStoreError::ReservationBusy),
        Some(row) => {
            let receipt = serde_json::from_str(&row.response).map_err(|err| {
                LedgerStoreError::query(format!("corrupt idempotency response: {err}"))
            })?;
            Ok(Probe::Replay(receipt))
        }
        None => {
            // Reserve before any money moves. A concurrent reserver makes
            // this insert a unique violation, dooming the transaction into
            // the retry loop where the race winner's record is then found.
            diesel::insert_into(idempotency_keys::table)
                .values(NewIdempotencyKeyRow {
                    id: Uuid::new_v4(),
                    key: key.as_str(),
                    response: PENDING_SENTINEL,
                    expires_at: now + retention(PENDING_RETENTION),
                })
                .execute(conn)
                .await?;
            Ok(Probe::Reserved)
        }
    }
}

#[async_trait]
impl LedgerStore for DieselLedgerStore {
    async fn post_transaction(
        &self,
        request: &PostingRequest,
    ) -> Result<PostOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let tuning = self.tuning;
        let user_id = request.user_id;
        let kind = request.kind;
        let amount = request.amount.cents();
        let key = request.idempotency_key.as_ref();

        conn.build_transaction()
            .serializable()
            .run(|conn| {
                async move {
                    apply_local_timeouts(conn, tuning).await?;
                    let now = Utc::now();

                    if let Some(key) = key {
                        match probe_reservation(conn, key, now).await? {
                            Probe::Replay(receipt) => return Ok(PostOutcome::Replayed(receipt)),
                            Probe::Reserved => {}
                        }
                    }

                    let snapshot: Option<i64> = accounts::table
                        .filter(accounts::user_id.eq(user_id))
                        .select(accounts::balance)
                        .first(conn)
                        .await
                        .optional()?;
                    let balance = snapshot.unwrap_or(0);

                    let proposed = match kind {
                        TransactionKind::Credit => balance + amount,
                        TransactionKind::Debit => balance - amount,
                    };
                    if proposed < 0 {
                        return Err(LedgerStoreError::InsufficientFunds {
                            balance,
                            requested: amount,
                        });
                    }

                    let inserted: TransactionRow = diesel::insert_into(transactions::table)
                        .values(NewTransactionRow {
                            id: Uuid::new_v4(),
                            user_id,
                            kind: kind.as_str(),
                            amount,
                            idempotency_key: key.map(IdempotencyKey::as_str),
                        })
                        .get_result(conn)
                        .await?;

                    // Single-statement upsert: two first-time writers for a
                    // brand-new user cannot both observe "no account" and
                    // both insert; the loser lands on the conflict arm.
                    diesel::insert_into(accounts::table)
                        .values(NewAccountRow {
                            id: Uuid::new_v4(),
                            user_id,
                            balance: proposed,
                            version: 1,
                        })
                        .on_conflict(accounts::user_id)
                        .do_update()
                        .set((
                            accounts::balance.eq(proposed),
                            accounts::version.eq(accounts::version + 1),
                            accounts::updated_at.eq(now),
                        ))
                        .execute(conn)
                        .await?;

                    let receipt = TransactionReceipt {
                        id: inserted.id,
                        user_id,
                        amount,
                        kind,
                    };

                    if let Some(key) = key {
                        let envelope = serde_json::to_string(&receipt).map_err(|err| {
                            LedgerStoreError::query(format!("receipt serialization failed: {err}"))
                        })?;
                        diesel::update(
                            idempotency_keys::table
                                .filter(idempotency_keys::key.eq(key.as_str())),
                        )
                        .set((
                            idempotency_keys::response.eq(envelope),
                            idempotency_keys::expires_at
                                .eq(now + retention(FINALIZED_RETENTION)),
                        ))
                        .execute(conn)
                        .await?;
                    }

                    Ok(PostOutcome::Committed(receipt))
                }
                .scope_boxed()
            })
            .await
    }

    async fn transactions_for_user(
        &self,
        user_id: Uuid,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<Transaction>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = transactions::table
            .filter(transactions::user_id.eq(user_id))
            .select(TransactionRow::as_select())
            .into_boxed();
        if let Some(kind) = kind {
            query = query.filter(transactions::kind.eq(kind.as_str()));
        }

        let rows: Vec<TransactionRow> = query
            .order(transactions::created_at.desc())
            .load(&mut conn)
            .await?;
        rows.into_iter().map(row_to_transaction).collect()
    }

    async fn balance_of(&self, user_id: Uuid) -> Result<i64, LedgerStoreError> {
        #[derive(QueryableByName)]
        struct BalanceRow {
            #[diesel(sql_type = BigInt)]
            balance: i64,
        }

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let snapshot: Option<i64> = accounts::table
            .filter(accounts::user_id.eq(user_id))
            .select(accounts::balance)
            .first(&mut conn)
            .await
            .optional()?;
        if let Some(balance) = snapshot {
            return Ok(balance);
        }

        // No snapshot yet: fold the log. Yields 0 for a brand-new user and
        // stays correct for any log state.
        let row: BalanceRow = diesel::sql_query(
            "SELECT COALESCE(SUM(CASE WHEN type = 'CREDIT' THEN amount ELSE -amount END), 0)::bigint \
             AS balance FROM transactions WHERE user_id = $1",
        )
        .bind::<diesel::sql_types::Uuid, _>(user_id)
        .get_result(&mut conn)
        .await?;
        Ok(row.balance)
    }

    async fn database_status(&self) -> Result<DbStatus, LedgerStoreError> {
        #[derive(QueryableByName)]
        struct StatusRow {
            #[diesel(sql_type = Text)]
            version: String,
            #[diesel(sql_type = Integer)]
            max_connections: i32,
            #[diesel(sql_type = Integer)]
            open_connections: i32,
        }

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: StatusRow = diesel::sql_query(
            "SELECT version() AS version, \
             current_setting('max_connections')::int AS max_connections, \
             (SELECT count(*) FROM pg_stat_activity)::int AS open_connections",
        )
        .get_result(&mut conn)
        .await?;
        Ok(DbStatus {
            version: row.version,
            max_connections: row.max_connections,
            open_connections: row.open_connections,
        })
    }

    async fn sweep_expired_keys(&self) -> Result<u64, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted =
            diesel::delete(idempotency_keys::table.filter(idempotency_keys::expires_at.lt(Utc::now())))
                .execute(&mut conn)
                .await?;
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn db_error(kind: diesel::result::DatabaseErrorKind) -> diesel::result::Error {
        diesel::result::Error::DatabaseError(kind, Box::new("details".to_string()))
    }

    #[rstest]
    fn serialization_failures_map_to_retryable_errors() {
        let err: LedgerStoreError =
            db_error(diesel::result::DatabaseErrorKind::SerializationFailure).into();
        assert!(err.is_retryable());
        assert!(matches!(err, LedgerStoreError::Serialization { .. }));
    }

    #[rstest]
    fn unique_violations_map_to_reservation_busy() {
        let err: LedgerStoreError =
            db_error(diesel::result::DatabaseErrorKind::UniqueViolation).into();
        assert_eq!(err, LedgerStoreError::ReservationBusy);
        assert!(err.is_retryable());
    }

    #[rstest]
    fn other_database_errors_are_terminal() {
        let err: LedgerStoreError =
            db_error(diesel::result::DatabaseErrorKind::ForeignKeyViolation).into();
        assert!(!err.is_retryable());
        assert!(matches!(err, LedgerStoreError::Query { .. }));

        let err: LedgerStoreError = diesel::result::Error::NotFound.into();
        assert!(!err.is_retryable());
    }

    #[rstest]
    fn closed_connections_map_to_connection_errors() {
        let err: LedgerStoreError =
            db_error(diesel::result::DatabaseErrorKind::ClosedConnection).into();
        assert!(matches!(err, LedgerStoreError::Connection { .. }));
    }

    #[rstest]
    fn corrupt_kind_columns_surface_as_query_errors() {
        let row = TransactionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: "TRANSFER".into(),
            amount: 10,
            idempotency_key: None,
            created_at: Utc::now(),
        };
        let err = row_to_transaction(row).expect_err("unknown kind must fail");
        assert!(matches!(err, LedgerStoreError::Query { .. }));
    }

    #[rstest]
    fn default_tuning_matches_deployment_expectations() {
        let tuning = StoreTuning::default();
        assert_eq!(tuning.lock_timeout, Duration::from_secs(5));
        assert_eq!(tuning.statement_timeout, Duration::from_secs(10));
    }
}
