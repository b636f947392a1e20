//! Request entry/exit logging.

use std::time::Instant;

use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::pipeline::Stage;
use crate::http::request::RequestContextExt;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogStage;

impl Stage for AccessLogStage {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn process(&self, req: Request<Body>, next: Next) -> BoxFuture<'_, Response> {
        async move {
            let start = Instant::now();
            let method = req.method().to_string();
            let path = req.uri().path().to_string();
            let request_id = req
                .context()
                .map(|ctx| ctx.request_id().to_string())
                .unwrap_or_default();

            tracing::info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                "Request started"
            );

            let response = next.run(req).await;
            let status = response.status().as_u16();

            tracing::info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status,
                latency_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            );
            metrics::record_request(&method, status, start);

            response
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::pipeline::PipelineBuilder;
    use crate::http::request::RequestIdStage;
    use axum::http::StatusCode;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_passes_response_through() {
        let app = PipelineBuilder::new()
            .stage(RequestIdStage)
            .stage(AccessLogStage)
            .build()
            .wrap(Router::new().route("/", get(|| async { (StatusCode::ACCEPTED, "done") })));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"done");
    }
}
