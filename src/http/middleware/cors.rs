//! Cross-origin resource sharing.
//!
//! # Responsibilities
//! - Reflect the request `Origin` when it is on the allow-list
//! - Answer every `OPTIONS` request directly with 200 and an empty body
//! - Add the fixed CORS headers to all other responses
//!
//! # Design Decisions
//! - Origins not on the list get no `Access-Control-Allow-Origin` at all;
//!   the browser enforces the rest
//! - Preflight never reaches handlers or later stages

use std::collections::HashSet;

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::pipeline::Stage;

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Request-ID";

#[derive(Debug, Clone)]
pub struct CorsStage {
    allowed_origins: HashSet<String>,
}

impl CorsStage {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_origins: origins
                .into_iter()
                .map(|o| o.into().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.contains(origin)
    }

    fn apply(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        if let Some(origin) = origin {
            if origin.to_str().map(|o| self.is_allowed(o)).unwrap_or(false) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            }
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process(&self, req: Request<Body>, next: Next) -> BoxFuture<'_, Response> {
        async move {
            let origin = req.headers().get(header::ORIGIN).cloned();

            let mut response = if req.method() == Method::OPTIONS {
                StatusCode::OK.into_response()
            } else {
                next.run(req).await
            };

            self.apply(origin.as_ref(), response.headers_mut());
            response
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::pipeline::PipelineBuilder;
    use axum::{routing::post, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(hits: Arc<AtomicUsize>) -> axum::Router {
        let router = Router::new().route(
            "/api/message/",
            post(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "created"
                }
            }),
        );
        PipelineBuilder::new()
            .stage(CorsStage::new(["http://localhost:3030"]))
            .build()
            .wrap(router)
    }

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(Arc::clone(&hits))
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/message/")
                    .header(header::ORIGIN, "http://localhost:3030")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        let headers = response.headers().clone();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3030"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_preflight_on_unknown_path() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(hits)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/nowhere")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unlisted_origin_not_reflected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(Arc::clone(&hits))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/message/")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    #[test]
    fn test_trailing_slash_ignored_in_config() {
        let cors = CorsStage::new(["https://app.example/"]);
        assert!(cors.is_allowed("https://app.example"));
        assert!(!cors.is_allowed("https://other.example"));
    }
}
