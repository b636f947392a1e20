//! Per-request context and request ID assignment.
//!
//! # Responsibilities
//! - Reuse an inbound `X-Request-ID` or generate a UUID v4
//! - Create the [`RequestContext`] every later stage and handler reads
//! - Echo the ID on the response
//! - Record the ID on the current tracing span
//!
//! # Design Decisions
//! - The request ID is assigned once, as early as possible, and never changes
//! - The session identity is the only mutable part of the context

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::pipeline::Stage;
use crate::http::response::ApiError;

/// Header carrying the request ID in both directions.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Inbound IDs longer than this are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Unique identifier of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Accept a client-supplied ID if it is non-empty, short and printable.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        let value = value.to_str().ok()?.trim();
        if value.is_empty()
            || value.len() > MAX_REQUEST_ID_LEN
            || !value.chars().all(|c| c.is_ascii_graphic())
        {
            return None;
        }
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated user attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: i64,
}

/// State carried alongside a single request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    identity: Option<SessionIdentity>,
}

impl RequestContext {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            identity: None,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.identity
    }

    pub fn attach_identity(&mut self, identity: SessionIdentity) {
        self.identity = Some(identity);
    }
}

/// Convenience accessor for the context stored in request extensions.
pub trait RequestContextExt {
    fn context(&self) -> Option<&RequestContext>;
    fn context_mut(&mut self) -> Option<&mut RequestContext>;
}

impl<B> RequestContextExt for Request<B> {
    fn context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }

    fn context_mut(&mut self) -> Option<&mut RequestContext> {
        self.extensions_mut().get_mut::<RequestContext>()
    }
}

/// Pipeline stage that assigns the request ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdStage;

impl Stage for RequestIdStage {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process(&self, mut req: Request<Body>, next: Next) -> BoxFuture<'_, Response> {
        async move {
            let request_id = req
                .headers()
                .get(&X_REQUEST_ID)
                .and_then(RequestId::from_header)
                .unwrap_or_else(RequestId::generate);

            tracing::Span::current().record("request_id", request_id.as_str());
            req.extensions_mut()
                .insert(RequestContext::new(request_id.clone()));

            let mut response = next.run(req).await;
            if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                response.headers_mut().insert(X_REQUEST_ID.clone(), value);
            }
            response
        }
        .boxed()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("request context missing".to_string()))
    }
}

/// Extractor that requires an authenticated session.
impl<S: Send + Sync> FromRequestParts<S> for SessionIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = RequestContext::from_request_parts(parts, state).await?;
        context
            .identity()
            .ok_or_else(|| ApiError::Unauthorized("User ID not found in session".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::pipeline::PipelineBuilder;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        let router = Router::new().route(
            "/",
            get(|ctx: RequestContext| async move { ctx.request_id().to_string() }),
        );
        PipelineBuilder::new()
            .stage(RequestIdStage)
            .build()
            .wrap(router)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_generates_id_when_absent() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response.headers()[&X_REQUEST_ID].to_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&header).is_ok());
        assert_eq!(body_string(response).await, header);
    }

    #[tokio::test]
    async fn test_reuses_inbound_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("X-Request-ID", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[&X_REQUEST_ID], "abc-123");
        assert_eq!(body_string(response).await, "abc-123");
    }

    #[test]
    fn test_rejects_unusable_inbound_ids() {
        assert!(RequestId::from_header(&HeaderValue::from_static("")).is_none());
        assert!(RequestId::from_header(&HeaderValue::from_static("has space")).is_none());
        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        assert!(RequestId::from_header(&HeaderValue::from_str(&long).unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_session_identity_requires_login() {
        let router = Router::new().route(
            "/",
            get(|identity: SessionIdentity| async move { identity.user_id.to_string() }),
        );
        let app = PipelineBuilder::new()
            .stage(RequestIdStage)
            .build()
            .wrap(router);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
