//! Request tracing middleware.
//!
//! Every request gets a fresh UUID trace identifier held in a task-local.
//! Log lines emitted while handling the request carry it via an `info_span`,
//! error envelopes pick it up when they serialize, and the response exposes
//! it in an `x-trace-id` header so clients can quote it in bug reports.

use std::task::{Context, Poll};

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::Error;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tokio::task_local;
use tracing::info_span;
use uuid::Uuid;

/// Response header carrying the request's trace identifier.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

task_local! {
    static TRACE_ID: String;
}

/// Trace identifier for the current task, if a request is in flight.
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.clone()).ok()
}

/// Middleware attaching a request-scoped trace identifier.
#[derive(Clone, Default)]
pub struct Trace;

impl<S, B> Transform<S, ServiceRequest> for Trace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TraceMiddleware { service }))
    }
}

/// Service wrapper produced by [`Trace`]; not used directly.
pub struct TraceMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for TraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let trace_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "request",
            trace_id = %trace_id,
            method = %req.method(),
            path = %req.path(),
        );
        let fut = self.service.call(req);

        Box::pin(TRACE_ID.scope(trace_id.clone(), async move {
            let _guard = span.enter();
            let mut res = fut.await?;
            if let Ok(value) = HeaderValue::from_str(&trace_id) {
                res.response_mut()
                    .headers_mut()
                    .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
            }
            Ok(res)
        }))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, HttpResponse, test, web};

    use super::*;

    #[actix_web::test]
    async fn responses_carry_a_trace_id_header() {
        let app = test::init_service(
            App::new()
                .wrap(Trace)
                .route("/ping", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
        let header = res
            .headers()
            .get(TRACE_ID_HEADER)
            .expect("trace id header should be present");
        Uuid::parse_str(header.to_str().expect("header should be ascii"))
            .expect("trace id should be a uuid");
    }

    #[actix_web::test]
    async fn handlers_observe_the_task_local_trace_id() {
        async fn echo_trace() -> HttpResponse {
            match current_trace_id() {
                Some(id) => HttpResponse::Ok().body(id),
                None => HttpResponse::InternalServerError().finish(),
            }
        }

        let app = test::init_service(
            App::new()
                .wrap(Trace)
                .route("/trace", web::get().to(echo_trace)),
        )
        .await;

        let res =
            test::call_service(&app, test::TestRequest::get().uri("/trace").to_request()).await;
        assert!(res.status().is_success());
        let body = test::read_body(res).await;
        Uuid::parse_str(std::str::from_utf8(&body).expect("body should be utf-8"))
            .expect("body should echo the task-local uuid");
    }
}
