//! Internal Diesel row structs; never exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{accounts, idempotency_keys, transactions};

/// Full row read from the transaction log.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub amount: i64,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a log append; `created_at` defaults to `now()`.
#[derive(Debug, Insertable)]
#[diesel(table_name = transactions)]
pub(crate) struct NewTransactionRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: &'a str,
    pub amount: i64,
    pub idempotency_key: Option<&'a str>,
}

/// Insert arm of the snapshot upsert; the conflict arm advances the
/// existing row instead.
#[derive(Debug, Insertable)]
#[diesel(table_name = accounts)]
pub(crate) struct NewAccountRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: i64,
    pub version: i64,
}

/// Full row read from the idempotency table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = idempotency_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct IdempotencyKeyRow {
    pub id: Uuid,
    pub key: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Reservation insert payload.
#[derive(Debug, Insertable)]
#[diesel(table_name = idempotency_keys)]
pub(crate) struct NewIdempotencyKeyRow<'a> {
    pub id: Uuid,
    pub key: &'a str,
    pub response: &'a str,
    pub expires_at: DateTime<Utc>,
}
