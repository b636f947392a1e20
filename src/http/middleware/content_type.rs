//! JSON-only request bodies.
//!
//! `POST`, `PUT` and `PATCH` must declare `application/json`. Parameters
//! such as `charset` are allowed and the media type compares
//! case-insensitively. Other methods pass untouched.

use axum::{
    body::Body,
    extract::Request,
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::pipeline::Stage;
use crate::http::response::ApiError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTypeStage;

fn requires_json(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

pub fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

impl Stage for ContentTypeStage {
    fn name(&self) -> &'static str {
        "content_type"
    }

    fn process(&self, req: Request<Body>, next: Next) -> BoxFuture<'_, Response> {
        async move {
            if requires_json(req.method()) {
                let ok = req
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(is_json)
                    .unwrap_or(false);
                if !ok {
                    return ApiError::UnsupportedMediaType.into_response();
                }
            }
            next.run(req).await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::pipeline::PipelineBuilder;
    use axum::http::StatusCode;
    use axum::{routing::any, Router};
    use tower::ServiceExt;

    #[test]
    fn test_is_json() {
        assert!(is_json("application/json"));
        assert!(is_json("application/json; charset=utf-8"));
        assert!(is_json("Application/JSON"));
        assert!(!is_json("text/plain"));
        assert!(!is_json("application/jsonp"));
        assert!(!is_json(""));
    }

    async fn status(method: Method, content_type: Option<&str>) -> StatusCode {
        let app = PipelineBuilder::new()
            .stage(ContentTypeStage)
            .build()
            .wrap(Router::new().route("/", any(|| async { "ok" })));

        let mut builder = Request::builder().method(method).uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_write_methods_need_json() {
        assert_eq!(
            status(Method::POST, None).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status(Method::PUT, Some("text/plain")).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status(Method::PATCH, Some("application/json")).await,
            StatusCode::OK
        );
        assert_eq!(
            status(Method::POST, Some("application/json; charset=utf-8")).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_other_methods_pass() {
        assert_eq!(status(Method::GET, None).await, StatusCode::OK);
        assert_eq!(status(Method::DELETE, None).await, StatusCode::OK);
    }
}
