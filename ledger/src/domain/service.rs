//! Posting service: the retry discipline around the write protocol plus
//! the read paths.
//!
//! The store runs the whole eight-step protocol in one serializable
//! database transaction and reports a tagged outcome; this layer decides
//! what is worth another attempt and how failures look on the wire.
//! Sleeping and jitter go through injected runtime abstractions so the
//! backoff schedule is unit-testable without clocks or randomness.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::json;
use tally_core::{ApiResult, Error};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ports::{DbStatus, LedgerStore, LedgerStoreError, PostOutcome};
use super::{PostingRequest, Transaction, TransactionKind, TransactionReceipt};

/// Async sleeping abstraction for retry backoff.
#[async_trait]
pub trait RetrySleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl RetrySleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry backoff jitter abstraction.
pub trait BackoffJitter: Send + Sync {
    /// Return a jittered delay from the exponential base delay.
    fn jittered_delay(&self, base: Duration, attempt: u32) -> Duration;
}

/// Production jitter: a uniform random spread on top of the base delay,
/// de-synchronising herds of retriers hitting the same account row.
#[derive(Debug, Clone, Copy)]
pub struct RandomJitter {
    max_jitter: Duration,
}

impl RandomJitter {
    pub fn up_to(max_jitter: Duration) -> Self {
        Self { max_jitter }
    }
}

impl Default for RandomJitter {
    /// Up to 50 ms of spread per sleep.
    fn default() -> Self {
        Self::up_to(Duration::from_millis(50))
    }
}

impl BackoffJitter for RandomJitter {
    fn jittered_delay(&self, base: Duration, _attempt: u32) -> Duration {
        let spread_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if spread_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..spread_ms))
    }
}

/// Runtime helpers used by the retry loop.
pub struct RetryRuntime {
    /// Async sleep implementation.
    pub sleeper: Arc<dyn RetrySleeper>,
    /// Jitter strategy for retry delays.
    pub jitter: Arc<dyn BackoffJitter>,
}

impl Default for RetryRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter::default()),
        }
    }
}

/// Backoff configuration for serialization retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// Ten attempts; the sleep after attempt *n* starts from
    /// `2^(n-1) * 100ms`, bounding tail latency under heavy single-user
    /// contention.
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Exponential base for the sleep after `attempt` has failed; the
    /// jitter strategy spreads it further.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Ledger operations, independent of the HTTP layer.
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    retry: RetryPolicy,
    runtime: RetryRuntime,
}

impl LedgerService {
    /// Build a service using default runtime dependencies.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            runtime: RetryRuntime::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Inject sleeper and jitter; tests use recording and fixed-offset
    /// doubles here.
    #[must_use]
    pub fn with_runtime(mut self, runtime: RetryRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Post a credit or debit, retrying serialization conflicts.
    ///
    /// Idempotent replays come back as plain successes; the client cannot
    /// tell a replay from the original commit and is not meant to.
    pub async fn post(&self, request: PostingRequest) -> ApiResult<TransactionReceipt> {
        for attempt in 1..=self.retry.max_attempts {
            match self.store.post_transaction(&request).await {
                Ok(PostOutcome::Committed(receipt)) => {
                    info!(
                        user_id = %request.user_id,
                        transaction_id = %receipt.id,
                        kind = request.kind.as_str(),
                        amount = receipt.amount,
                        attempt,
                        "transaction committed"
                    );
                    return Ok(receipt);
                }
                Ok(PostOutcome::Replayed(receipt)) => {
                    info!(
                        user_id = %request.user_id,
                        transaction_id = %receipt.id,
                        "idempotent replay served"
                    );
                    return Ok(receipt);
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self
                        .runtime
                        .jitter
                        .jittered_delay(self.retry.base_delay_for(attempt), attempt);
                    debug!(
                        user_id = %request.user_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %err,
                        "posting conflicted, backing off"
                    );
                    self.runtime.sleeper.sleep(delay).await;
                }
                Err(err) => return Err(map_store_error(err, self.retry.max_attempts)),
            }
        }
        // max_attempts >= 1 makes the loop return; this covers a
        // misconfigured zero-attempt policy.
        Err(Error::internal("posting retry budget exhausted"))
    }

    /// List the principal's transactions, newest first.
    pub async fn list(
        &self,
        user_id: Uuid,
        kind: Option<TransactionKind>,
    ) -> ApiResult<Vec<Transaction>> {
        self.store
            .transactions_for_user(user_id, kind)
            .await
            .map_err(|err| map_store_error(err, self.retry.max_attempts))
    }

    /// Current balance in cents.
    pub async fn balance(&self, user_id: Uuid) -> ApiResult<i64> {
        self.store
            .balance_of(user_id)
            .await
            .map_err(|err| map_store_error(err, self.retry.max_attempts))
    }

    /// Dependency health for the status endpoint.
    pub async fn status(&self) -> ApiResult<DbStatus> {
        self.store
            .database_status()
            .await
            .map_err(|err| map_store_error(err, self.retry.max_attempts))
    }

    /// Delete expired idempotency records; used by the background sweeper.
    pub async fn sweep_expired(&self) -> ApiResult<u64> {
        let deleted = self
            .store
            .sweep_expired_keys()
            .await
            .map_err(|err| map_store_error(err, self.retry.max_attempts))?;
        if deleted > 0 {
            info!(deleted, "expired idempotency records swept");
        }
        Ok(deleted)
    }
}

fn map_store_error(error: LedgerStoreError, attempts: u32) -> Error {
    match error {
        LedgerStoreError::InsufficientFunds { balance, requested } => {
            Error::insufficient_balance("debit would overdraw the account").with_details(json!({
                "current_balance": balance,
                "requested_amount": requested,
                "shortage": requested - balance,
            }))
        }
        LedgerStoreError::Serialization { message } => {
            warn!(attempts, message = %message, "serialization retries exhausted");
            Error::internal(format!(
                "transaction could not be serialized after {attempts} attempts"
            ))
        }
        LedgerStoreError::ReservationBusy => {
            warn!(attempts, "idempotency reservation still held after retries");
            Error::internal("idempotency reservation is held by a concurrent writer")
        }
        LedgerStoreError::Connection { message } => {
            Error::service_unavailable(format!("ledger store unavailable: {message}"))
        }
        LedgerStoreError::Query { message } => {
            Error::internal(format!("ledger store error: {message}"))
        }
    }
}
