//! Balance handler.

use actix_web::{HttpRequest, get, web};
use serde::{Deserialize, Serialize};
use tally_core::Error;
use utoipa::ToSchema;

use super::ApiResult;
use super::auth::require_principal;
use super::state::HttpState;

/// Balance response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    /// Current balance in cents.
    pub amount: i64,
}

/// Read the authenticated user's balance.
#[utoipa::path(
    get,
    path = "/api/v1/balance",
    responses(
        (status = 200, description = "Current balance in cents", body = BalanceResponse),
        (status = 401, description = "Unauthorised", body = Error),
    ),
    tags = ["balance"],
)]
#[get("/balance")]
pub async fn get_balance(
    req: HttpRequest,
    state: web::Data<HttpState>,
) -> ApiResult<web::Json<BalanceResponse>> {
    let principal = require_principal(&req, &state).await?;
    let amount = state.ledger.balance(principal).await?;
    Ok(web::Json(BalanceResponse { amount }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::header::AUTHORIZATION;
    use actix_web::{App, test};
    use uuid::Uuid;

    use super::*;
    use crate::domain::LedgerService;
    use crate::domain::ports::{MockLedgerStore, MockTokenVerifier};

    #[actix_web::test]
    async fn balance_is_returned_for_the_principal() {
        let principal = Uuid::new_v4();
        let mut store = MockLedgerStore::new();
        store.expect_balance_of().returning(move |user_id| {
            assert_eq!(user_id, principal);
            Ok(50_000)
        });
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().returning(move |_| Ok(principal));

        let state = web::Data::new(HttpState::new(
            Arc::new(LedgerService::new(Arc::new(store))),
            Arc::new(verifier),
        ));
        let app =
            test::init_service(App::new().app_data(state).service(get_balance)).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/balance")
                .insert_header((AUTHORIZATION, "Bearer token"))
                .to_request(),
        )
        .await;

        assert!(res.status().is_success());
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["amount"], 50_000);
    }
}
