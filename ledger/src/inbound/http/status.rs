//! Dependency status handler.

use actix_web::{get, web};
use tally_core::Error;

use super::ApiResult;
use super::state::HttpState;
use crate::domain::ports::DbStatus;

/// Report database health: server version and connection headroom.
///
/// Carries no auth guard; it exposes operational metadata only.
#[utoipa::path(
    get,
    path = "/api/v1/status",
    responses(
        (status = 200, description = "Database reachable", body = DbStatus),
        (status = 500, description = "Database unreachable", body = Error),
        (status = 503, description = "Database unreachable", body = Error),
    ),
    tags = ["status"],
)]
#[get("/status")]
pub async fn get_status(state: web::Data<HttpState>) -> ApiResult<web::Json<DbStatus>> {
    let status = state.ledger.status().await?;
    Ok(web::Json(status))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};

    use super::*;
    use crate::domain::LedgerService;
    use crate::domain::ports::{MockLedgerStore, MockTokenVerifier};

    #[actix_web::test]
    async fn status_reports_database_health_without_auth() {
        let mut store = MockLedgerStore::new();
        store.expect_database_status().returning(|| {
            Ok(DbStatus {
                version: "PostgreSQL 16.3".into(),
                max_connections: 100,
                open_connections: 7,
            })
        });

        let state = web::Data::new(HttpState::new(
            Arc::new(LedgerService::new(Arc::new(store))),
            Arc::new(MockTokenVerifier::new()),
        ));
        let app = test::init_service(App::new().app_data(state).service(get_status)).await;

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/status").to_request(),
        )
        .await;

        assert!(res.status().is_success());
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["version"], "PostgreSQL 16.3");
        assert_eq!(body["max_connections"], 100);
        assert_eq!(body["open_connections"], 7);
    }
}
