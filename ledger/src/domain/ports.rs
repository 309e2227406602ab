//! Ports implemented by the ledger service's outbound adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{PostingRequest, Transaction, TransactionKind, TransactionReceipt};

/// Result of one attempt at the transactional write protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// A new transaction row was appended and the snapshot advanced.
    Committed(TransactionReceipt),
    /// A finalized idempotency record already existed; its stored receipt
    /// is returned and nothing was written.
    Replayed(TransactionReceipt),
}

/// Errors raised by ledger store adapters.
///
/// `Serialization` and `ReservationBusy` are transient: the retry loop
/// re-runs the whole transaction on either. Everything else is terminal
/// for the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerStoreError {
    #[error("debit of {requested} exceeds balance {balance}")]
    InsufficientFunds { balance: i64, requested: i64 },
    #[error("transaction could not be serialized: {message}")]
    Serialization { message: String },
    #[error("idempotency reservation is held by a concurrent writer")]
    ReservationBusy,
    #[error("ledger store connection failed: {message}")]
    Connection { message: String },
    #[error("ledger store query failed: {message}")]
    Query { message: String },
}

impl LedgerStoreError {
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

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

    /// Whether re-running the whole transaction can help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Serialization { .. } | Self::ReservationBusy)
    }
}

/// Dependency health snapshot for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DbStatus {
    pub version: String,
    pub max_connections: i32,
    pub open_connections: i32,
}

/// Port for ledger persistence.
///
/// `post_transaction` executes the entire eight-step write protocol inside
/// one database transaction under serializable isolation; callers own the
/// retry discipline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn post_transaction(
        &self,
        request: &PostingRequest,
    ) -> Result<PostOutcome, LedgerStoreError>;

    /// The principal's transactions, newest first, optionally filtered.
    async fn transactions_for_user(
        &self,
        user_id: Uuid,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<Transaction>, LedgerStoreError>;

    /// Snapshot balance, falling back to summing the log when no snapshot
    /// row exists yet.
    async fn balance_of(&self, user_id: Uuid) -> Result<i64, LedgerStoreError>;

    async fn database_status(&self) -> Result<DbStatus, LedgerStoreError>;

    /// Delete expired idempotency records, returning the count.
    async fn sweep_expired_keys(&self) -> Result<u64, LedgerStoreError>;
}

/// Failure to establish a principal for a presented external token.
///
/// One shape for every cause: transport failures, non-2xx answers, and
/// outright rejections by the identity service are indistinguishable to the
/// caller, which treats them all as "not authenticated".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token rejected: {reason}")]
pub struct TokenRejected {
    pub reason: String,
}

impl TokenRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Port for remote validation of external tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Resolve the principal behind an external token.
    async fn verify(&self, token: &str) -> Result<Uuid, TokenRejected>;
}
