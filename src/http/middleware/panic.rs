//! Panic recovery.
//!
//! A panic anywhere below this stage is logged with the request's method,
//! path and ID and turned into the standard opaque 500. The process keeps
//! serving.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::pipeline::Stage;
use crate::http::request::RequestContextExt;
use crate::http::response::internal_error_response;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, Default)]
pub struct PanicRecoveryStage;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

impl Stage for PanicRecoveryStage {
    fn name(&self) -> &'static str {
        "panic_recovery"
    }

    fn process(&self, req: Request<Body>, next: Next) -> BoxFuture<'_, Response> {
        async move {
            let method = req.method().clone();
            let path = req.uri().path().to_string();
            let request_id = req
                .context()
                .map(|ctx| ctx.request_id().to_string())
                .unwrap_or_default();

            match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                Ok(response) => response,
                Err(payload) => {
                    tracing::error!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        panic = panic_message(payload.as_ref()),
                        "Handler panicked"
                    );
                    metrics::record_panic();
                    internal_error_response()
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::pipeline::PipelineBuilder;
    use crate::http::request::{RequestIdStage, X_REQUEST_ID};
    use axum::http::StatusCode;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        let router = Router::new()
            .route(
                "/boom",
                get(|| async {
                    if true {
                        panic!("index out of range");
                    }
                    "unreachable"
                }),
            )
            .route("/fine", get(|| async { "fine" }));
        PipelineBuilder::new()
            .stage(RequestIdStage)
            .stage(PanicRecoveryStage)
            .build()
            .wrap(router)
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let app = app();
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key(&X_REQUEST_ID));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, serde_json::json!({"error": "Internal server error"}));

        // Still serving afterwards.
        let response = app
            .oneshot(Request::builder().uri("/fine").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_panic_message_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
