//! Ledger domain: transaction model, ports, and the posting service.

mod idempotency;
pub mod ports;
mod service;
mod transaction;

pub use idempotency::{
    FINALIZED_RETENTION, IdempotencyKey, IdempotencyKeyValidationError, PENDING_RETENTION,
    PENDING_SENTINEL,
};
pub use service::{
    BackoffJitter, LedgerService, RandomJitter, RetryPolicy, RetryRuntime, RetrySleeper,
    TokioSleeper,
};
pub use transaction::{
    Amount, AmountValidationError, ParseTransactionKindError, PostingRequest, Transaction,
    TransactionKind, TransactionReceipt,
};
