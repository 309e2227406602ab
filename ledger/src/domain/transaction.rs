//! Transaction model.
//!
//! Monetary values are integer cents end to end; no floating point touches
//! the value path. Amounts are strictly positive once parsed, so the only
//! signed arithmetic happens when a debit is applied to a balance.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::IdempotencyKey;

/// Direction of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transaction kind must be CREDIT or DEBIT, got {value}")]
pub struct ParseTransactionKindError {
    value: String,
}

impl FromStr for TransactionKind {
    type Err = ParseTransactionKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CREDIT" => Ok(Self::Credit),
            "DEBIT" => Ok(Self::Debit),
            other => Err(ParseTransactionKindError {
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AmountValidationError {
    #[error("amount must be a positive number of cents")]
    NotPositive,
}

/// Strictly positive amount in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub fn new(cents: i64) -> Result<Self, AmountValidationError> {
        if cents < 1 {
            return Err(AmountValidationError::NotPositive);
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }
}

/// One row of the append-only transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Response envelope for a committed (or replayed) posting.
///
/// Also the payload persisted in a finalized idempotency record, so its
/// serialized form is part of the storage contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionReceipt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

/// A validated posting ready for the write protocol.
#[derive(Debug, Clone)]
pub struct PostingRequest {
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub idempotency_key: Option<IdempotencyKey>,
}
