//! Transaction handlers: posting and listing.

use actix_web::http::header::HeaderMap;
use actix_web::{HttpRequest, get, post, web};
use serde::{Deserialize, Serialize};
use tally_core::Error;
use utoipa::ToSchema;

use super::ApiResult;
use super::auth::require_principal;
use super::state::HttpState;
use crate::domain::{
    Amount, IdempotencyKey, PostingRequest, Transaction, TransactionKind, TransactionReceipt,
};

/// Header binding a posting to a single server-side effect.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Posting request body.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct PostTransactionRequest {
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
}

/// Optional listing filter: `?type=CREDIT|DEBIT`.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
}

/// Extract and validate the idempotency key header, if present.
fn extract_idempotency_key(headers: &HeaderMap) -> ApiResult<Option<IdempotencyKey>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let raw = value.to_str().map_err(|_| {
        Error::invalid_request("x-idempotency-key header must be visible ascii")
    })?;
    IdempotencyKey::new(raw)
        .map(Some)
        .map_err(|err| Error::invalid_request(err.to_string()))
}

/// Post a credit or debit against the authenticated user's account.
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = PostTransactionRequest,
    params(
        ("x-idempotency-key" = Option<String>, Header, description = "Client-chosen idempotency key"),
    ),
    responses(
        (status = 200, description = "Committed or idempotently replayed", body = TransactionReceipt),
        (status = 400, description = "Invalid amount or insufficient balance", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 500, description = "Retries exhausted or unexpected failure", body = Error),
    ),
    tags = ["transactions"],
)]
#[post("/transactions")]
pub async fn post_transaction(
    req: HttpRequest,
    state: web::Data<HttpState>,
    payload: web::Json<PostTransactionRequest>,
) -> ApiResult<web::Json<TransactionReceipt>> {
    let principal = require_principal(&req, &state).await?;
    let idempotency_key = extract_idempotency_key(req.headers())?;

    // Amount validation happens before any database work.
    let amount = Amount::new(payload.amount)
        .map_err(|err| Error::invalid_amount(err.to_string()))?;

    let receipt = state
        .ledger
        .post(PostingRequest {
            user_id: principal,
            kind: payload.kind,
            amount,
            idempotency_key,
        })
        .await?;
    Ok(web::Json(receipt))
}

/// List the authenticated user's transactions, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    params(
        ("type" = Option<String>, Query, description = "Filter by CREDIT or DEBIT"),
    ),
    responses(
        (status = 200, description = "Transactions, newest first", body = [Transaction]),
        (status = 400, description = "Unknown type filter", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
    ),
    tags = ["transactions"],
)]
#[get("/transactions")]
pub async fn list_transactions(
    req: HttpRequest,
    state: web::Data<HttpState>,
    query: web::Query<ListTransactionsQuery>,
) -> ApiResult<web::Json<Vec<Transaction>>> {
    let principal = require_principal(&req, &state).await?;
    let transactions = state.ledger.list(principal, query.kind).await?;
    Ok(web::Json(transactions))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::header::AUTHORIZATION;
    use actix_web::{App, test};
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::ports::{
        LedgerStoreError, MockLedgerStore, MockTokenVerifier, PostOutcome, TokenRejected,
    };
    use crate::domain::{LedgerService, RetryPolicy};

    fn fast_service(store: MockLedgerStore) -> Arc<LedgerService> {
        Arc::new(LedgerService::new(Arc::new(store)).with_retry_policy(RetryPolicy {
            max_attempts: 2,
            base_delay: std::time::Duration::from_millis(1),
        }))
    }

    fn accepting_verifier(principal: Uuid) -> MockTokenVerifier {
        let mut verifier = MockTokenVerifier::new();
        verifier
            .expect_verify()
            .returning(move |_| Ok(principal));
        verifier
    }

    fn rejecting_verifier() -> MockTokenVerifier {
        let mut verifier = MockTokenVerifier::new();
        verifier
            .expect_verify()
            .returning(|_| Err(TokenRejected::new("identity said no")));
        verifier
    }

    fn state(store: MockLedgerStore, verifier: MockTokenVerifier) -> web::Data<HttpState> {
        web::Data::new(HttpState::new(fast_service(store), Arc::new(verifier)))
    }

    macro_rules! ledger_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state)
                    .service(post_transaction)
                    .service(list_transactions),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn posting_a_credit_returns_the_receipt() {
        let principal = Uuid::new_v4();
        let mut store = MockLedgerStore::new();
        store.expect_post_transaction().returning(move |request| {
            Ok(PostOutcome::Committed(TransactionReceipt {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                amount: request.amount.cents(),
                kind: request.kind,
            }))
        });

        let app = ledger_app!(state(store, accepting_verifier(principal)));
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/transactions")
                .insert_header((AUTHORIZATION, "Bearer token"))
                .set_json(serde_json::json!({ "amount": 50000, "type": "CREDIT" }))
                .to_request(),
        )
        .await;

        assert!(res.status().is_success());
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["amount"], 50000);
        assert_eq!(body["type"], "CREDIT");
        assert_eq!(body["user_id"], principal.to_string());
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized_and_never_reaches_the_store() {
        // No expectations on the store: a call would panic the test.
        let app = ledger_app!(state(MockLedgerStore::new(), MockTokenVerifier::new()));
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/transactions")
                .set_json(serde_json::json!({ "amount": 100, "type": "CREDIT" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status().as_u16(), 401);
    }

    #[actix_web::test]
    async fn rejected_token_is_unauthorized() {
        let app = ledger_app!(state(MockLedgerStore::new(), rejecting_verifier()));
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/transactions")
                .insert_header((AUTHORIZATION, "Bearer stale-token"))
                .set_json(serde_json::json!({ "amount": 100, "type": "CREDIT" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status().as_u16(), 401);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[actix_web::test]
    async fn non_positive_amounts_are_rejected_before_the_store() {
        let app = ledger_app!(state(
            MockLedgerStore::new(),
            accepting_verifier(Uuid::new_v4())
        ));
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/transactions")
                .insert_header((AUTHORIZATION, "Bearer token"))
                .set_json(serde_json::json!({ "amount": 0, "type": "DEBIT" }))
                .to_request(),
        )
        .await;

        assert_eq!(res.status().as_u16(), 400);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "INVALID_AMOUNT");
    }

    #[actix_web::test]
    async fn overdrafts_return_the_shortage_details() {
        let mut store = MockLedgerStore::new();
        store.expect_post_transaction().returning(|_| {
            Err(LedgerStoreError::InsufficientFunds {
                balance: 0,
                requested: 1,
            })
        });

        let app = ledger_app!(state(store, accepting_verifier(Uuid::new_v4())));
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/transactions")
                .insert_header((AUTHORIZATION, "Bearer token"))
                .set_json(serde_json::json!({ "amount": 1, "type": "DEBIT" }))
                .to_request(),
        )
        .await;

        assert_eq!(res.status().as_u16(), 400);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "INSUFFICIENT_BALANCE");
        assert_eq!(body["details"]["shortage"], 1);
    }

    #[actix_web::test]
    async fn blank_idempotency_keys_are_rejected() {
        let app = ledger_app!(state(
            MockLedgerStore::new(),
            accepting_verifier(Uuid::new_v4())
        ));
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/transactions")
                .insert_header((AUTHORIZATION, "Bearer token"))
                .insert_header((IDEMPOTENCY_KEY_HEADER, "   "))
                .set_json(serde_json::json!({ "amount": 100, "type": "CREDIT" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn idempotency_key_reaches_the_store() {
        let mut store = MockLedgerStore::new();
        store.expect_post_transaction().returning(|request| {
            assert_eq!(
                request
                    .idempotency_key
                    .as_ref()
                    .map(IdempotencyKey::as_str),
                Some("k1")
            );
            Ok(PostOutcome::Replayed(TransactionReceipt {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                amount: request.amount.cents(),
                kind: request.kind,
            }))
        });

        let app = ledger_app!(state(store, accepting_verifier(Uuid::new_v4())));
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/transactions")
                .insert_header((AUTHORIZATION, "Bearer token"))
                .insert_header((IDEMPOTENCY_KEY_HEADER, "k1"))
                .set_json(serde_json::json!({ "amount": 1500, "type": "CREDIT" }))
                .to_request(),
        )
        .await;
        assert!(res.status().is_success());
    }

    #[actix_web::test]
    async fn listing_filters_by_kind() {
        let principal = Uuid::new_v4();
        let mut store = MockLedgerStore::new();
        store
            .expect_transactions_for_user()
            .returning(move |user_id, kind| {
                assert_eq!(user_id, principal);
                assert_eq!(kind, Some(TransactionKind::Debit));
                Ok(vec![Transaction {
                    id: Uuid::new_v4(),
                    user_id,
                    kind: TransactionKind::Debit,
                    amount: 250,
                    idempotency_key: None,
                    created_at: Utc::now(),
                }])
            });

        let app = ledger_app!(state(store, accepting_verifier(principal)));
        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/transactions?type=DEBIT")
                .insert_header((AUTHORIZATION, "Bearer token"))
                .to_request(),
        )
        .await;

        assert!(res.status().is_success());
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body[0]["type"], "DEBIT");
        assert_eq!(body[0]["amount"], 250);
    }

    #[actix_web::test]
    async fn unknown_kind_filter_is_a_bad_request() {
        let app = ledger_app!(state(
            MockLedgerStore::new(),
            accepting_verifier(Uuid::new_v4())
        ));
        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/transactions?type=TRANSFER")
                .insert_header((AUTHORIZATION, "Bearer token"))
                .to_request(),
        )
        .await;
        assert_eq!(res.status().as_u16(), 400);
    }
}
