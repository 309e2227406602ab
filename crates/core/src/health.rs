//! Liveness and readiness probes mounted by both services.
//!
//! Probes answer in the product's JSON vocabulary: readiness failures are
//! the standard error envelope (`SERVICE_UNAVAILABLE`), successes carry a
//! small status body, so orchestrators and humans read the same shapes
//! here as on every other endpoint.

use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::{HttpResponse, get, web};
use serde_json::json;

use crate::error::{ApiResult, Error};

/// Shared readiness flag flipped once a service finishes wiring its
/// adapters and binds its socket.
#[derive(Default)]
pub struct HealthState {
    ready: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

/// Readiness probe: `{"status": "ready"}` once the server can take
/// traffic, a `SERVICE_UNAVAILABLE` envelope before.
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Ready for traffic"),
        (status = 503, description = "Still starting up", body = Error)
    )
)]
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> ApiResult<HttpResponse> {
    if !state.is_ready() {
        return Err(Error::service_unavailable("service is still starting"));
    }
    Ok(HttpResponse::Ok().json(json!({ "status": "ready" })))
}

/// Liveness probe: answers whenever the process is responsive.
#[utoipa::path(
    get,
    path = "/health/live",
    responses((status = 200, description = "Process is alive"))
)]
#[get("/health/live")]
pub async fn live() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "alive" }))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};

    use super::*;

    #[actix_web::test]
    async fn readiness_answers_the_error_envelope_until_marked() {
        let state = web::Data::new(HealthState::new());
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(ready)
                .service(live),
        )
        .await;

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/health/ready").to_request(),
        )
        .await;
        assert_eq!(res.status().as_u16(), 503);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "SERVICE_UNAVAILABLE");

        state.mark_ready();
        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/health/ready").to_request(),
        )
        .await;
        assert!(res.status().is_success());
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["status"], "ready");
    }

    #[actix_web::test]
    async fn liveness_reports_the_process_alive() {
        let app = test::init_service(App::new().service(live)).await;
        let res = test::call_service(
            &app,
            test::TestRequest::get().uri("/health/live").to_request(),
        )
        .await;
        assert!(res.status().is_success());
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["status"], "alive");
    }
}
