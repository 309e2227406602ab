//! Idempotency key model and retention policy.

use std::time::Duration;

/// Reservation marker stored while a posting is mid-commit.
pub const PENDING_SENTINEL: &str = "__PENDING__";

/// How long a finalized record replays its response.
pub const FINALIZED_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// How long a reservation may linger before a sweeper reclaims it. Long
/// enough to cover any realistic in-flight window.
pub const PENDING_RETENTION: Duration = Duration::from_secs(90 * 24 * 60 * 60);

const KEY_MAX_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdempotencyKeyValidationError {
    #[error("idempotency key must not be empty")]
    Empty,
    #[error("idempotency key must be at most {KEY_MAX_LENGTH} characters")]
    TooLong,
}

/// Client-chosen opaque key binding a write to a single server-side effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, IdempotencyKeyValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdempotencyKeyValidationError::Empty);
        }
        if trimmed.chars().count() > KEY_MAX_LENGTH {
            return Err(IdempotencyKeyValidationError::TooLong);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn keys_are_trimmed_and_preserved() {
        let key = IdempotencyKey::new("  k1  ").expect("key should parse");
        assert_eq!(key.as_str(), "k1");
    }

    #[rstest]
    fn blank_keys_are_rejected() {
        assert_eq!(
            IdempotencyKey::new("   "),
            Err(IdempotencyKeyValidationError::Empty)
        );
    }

    #[rstest]
    fn oversized_keys_are_rejected() {
        let raw = "k".repeat(256);
        assert_eq!(
            IdempotencyKey::new(raw),
            Err(IdempotencyKeyValidationError::TooLong)
        );
        assert!(IdempotencyKey::new("k".repeat(255)).is_ok());
    }

    #[rstest]
    fn pending_retention_outlives_finalized_retention() {
        // The reservation window is the crash-recovery safety net; it must
        // never be shorter than the replay window.
        assert!(PENDING_RETENTION > FINALIZED_RETENTION);
    }
}
