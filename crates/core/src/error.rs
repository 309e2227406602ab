//! Product-wide error envelope and its HTTP mapping.
//!
//! Every failure either service returns to a client serializes to the same
//! JSON shape: `{"error": CODE, "message": ..., "details"?: ..., "trace_id"?: ...}`.
//! Domain and adapter code construct these values; the `ResponseError` impl
//! at the bottom turns them into status codes and redacts internals.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

use crate::trace::current_trace_id;

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

/// Stable machine-readable error code, serialized SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request body or parameters fail validation.
    InvalidRequest,
    /// The posted amount is zero or negative.
    InvalidAmount,
    /// Authentication is missing or was rejected.
    Unauthorized,
    /// Authenticated but not permitted to touch the target resource.
    Forbidden,
    /// The addressed resource does not exist.
    NotFound,
    /// Registration with an email that is already taken.
    EmailConflict,
    /// A debit would drive the balance below zero.
    InsufficientBalance,
    /// A required dependency is unreachable.
    ServiceUnavailable,
    /// Any other failure.
    InternalError,
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest | ErrorCode::InvalidAmount | ErrorCode::InsufficientBalance => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::EmailConflict => StatusCode::CONFLICT,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error payload returned to clients by both services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    #[serde(rename = "error")]
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
}

impl Error {
    /// Build an error with the given code and client-facing message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            trace_id: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Attach structured details to the payload.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAmount, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn email_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EmailConflict, message)
    }

    pub fn insufficient_balance(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InsufficientBalance, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Replace server-side detail with a generic message for internal errors.
    fn redacted_for_clients(&self) -> Self {
        if self.code != ErrorCode::InternalError {
            return self.clone();
        }
        Self {
            code: self.code,
            message: "internal server error".into(),
            details: None,
            trace_id: self.trace_id.clone(),
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code)
    }

    fn error_response(&self) -> HttpResponse {
        if self.code == ErrorCode::InternalError {
            error!(message = %self.message, "internal error surfaced to client");
        }
        let mut payload = self.redacted_for_clients();
        if payload.trace_id.is_none() {
            payload.trace_id = current_trace_id();
        }
        HttpResponse::build(self.status_code()).json(payload)
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        // Never leak framework detail to clients.
        error!(error = %err, "actix error promoted to envelope error");
        Error::internal("internal server error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(ErrorCode::InvalidRequest, StatusCode::BAD_REQUEST)]
    #[case(ErrorCode::InvalidAmount, StatusCode::BAD_REQUEST)]
    #[case(ErrorCode::InsufficientBalance, StatusCode::BAD_REQUEST)]
    #[case(ErrorCode::Unauthorized, StatusCode::UNAUTHORIZED)]
    #[case(ErrorCode::Forbidden, StatusCode::FORBIDDEN)]
    #[case(ErrorCode::NotFound, StatusCode::NOT_FOUND)]
    #[case(ErrorCode::EmailConflict, StatusCode::CONFLICT)]
    #[case(ErrorCode::ServiceUnavailable, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(ErrorCode::InternalError, StatusCode::INTERNAL_SERVER_ERROR)]
    fn codes_map_to_expected_statuses(#[case] code: ErrorCode, #[case] expected: StatusCode) {
        assert_eq!(Error::new(code, "boom").status_code(), expected);
    }

    #[rstest]
    fn serializes_code_under_the_error_key() {
        let err = Error::insufficient_balance("balance too low").with_details(json!({
            "current_balance": 100,
            "requested_amount": 250,
            "shortage": 150,
        }));

        let value = serde_json::to_value(&err).expect("error should serialize");
        assert_eq!(value["error"], "INSUFFICIENT_BALANCE");
        assert_eq!(value["message"], "balance too low");
        assert_eq!(value["details"]["shortage"], 150);
        assert!(value.get("trace_id").is_none());
    }

    #[rstest]
    fn internal_errors_are_redacted() {
        let err = Error::internal("pool checkout failed: db04 unreachable")
            .with_details(json!({"host": "db04"}));

        let redacted = err.redacted_for_clients();
        assert_eq!(redacted.message(), "internal server error");
        assert!(redacted.details().is_none());
    }

    #[rstest]
    fn non_internal_errors_keep_their_message() {
        let err = Error::forbidden("users may only update their own profile");
        assert_eq!(
            err.redacted_for_clients().message(),
            "users may only update their own profile"
        );
    }
}
