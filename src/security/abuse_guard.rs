//! Message abuse guard.
//!
//! # Responsibilities
//! - Buffer the request body and pull out `client_id`
//! - Refuse when the credential reached its lifetime cap
//! - Refuse when the credential sent too many messages in the trailing window
//! - Hand the untouched body on to the handler
//!
//! # Data Flow
//! ```text
//! POST /api/message/
//!     → buffer body (bounded by max_body_size)
//!     → client_id from JSON
//!     → MessageStore::count_by_client        ≥ max_total  → 429
//!     → MessageStore::count_by_client_since  ≥ per_window → 429
//!     → rebuild request with buffered body → handler
//! ```
//!
//! # Design Decisions
//! - Counts come straight from the store on every request; the guard holds no
//!   state, so multiple instances agree as far as the store does
//! - Check-then-insert is not atomic: concurrent requests for one credential
//!   can each observe `max - 1` and both pass
//! - A failing count query is a 500, never a pass
//! - A body over `max_body_size` is the client's fault: 413, not 500

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use http_body_util::LengthLimitError;
use futures_util::FutureExt;
use serde::Deserialize;

use crate::config::AbuseConfig;
use crate::http::pipeline::Stage;
use crate::http::response::{ApiError, ThrottleReason};
use crate::observability::metrics;
use crate::store::MessageStore;

/// Per-credential message caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbuseLimits {
    pub max_total: u64,
    pub max_per_window: u64,
    pub window: Duration,
}

impl Default for AbuseLimits {
    fn default() -> Self {
        Self {
            max_total: 10,
            max_per_window: 5,
            window: Duration::from_secs(60),
        }
    }
}

impl From<&AbuseConfig> for AbuseLimits {
    fn from(config: &AbuseConfig) -> Self {
        Self {
            max_total: config.max_total_messages,
            max_per_window: config.max_messages_per_window,
            window: Duration::from_secs(config.window_secs),
        }
    }
}

#[derive(Deserialize)]
struct ClientCredential {
    #[serde(default)]
    client_id: String,
}

pub struct AbuseGuard {
    store: Arc<dyn MessageStore>,
    limits: AbuseLimits,
    max_body_size: usize,
}

impl AbuseGuard {
    pub fn new(store: Arc<dyn MessageStore>, limits: AbuseLimits, max_body_size: usize) -> Self {
        Self {
            store,
            limits,
            max_body_size,
        }
    }

    pub fn limits(&self) -> AbuseLimits {
        self.limits
    }

    /// Run both caps for `client_id`, lifetime cap first.
    pub fn check(&self, client_id: &str) -> Result<(), ApiError> {
        let total = self.store.count_by_client(client_id)?;
        if total >= self.limits.max_total {
            return Err(ApiError::Throttled(ThrottleReason::TotalCap {
                limit: self.limits.max_total,
            }));
        }

        let recent = self
            .store
            .count_by_client_since(client_id, self.limits.window)?;
        if recent >= self.limits.max_per_window {
            return Err(ApiError::Throttled(ThrottleReason::WindowCap));
        }

        Ok(())
    }

    async fn guard(&self, req: Request<Body>) -> Result<Request<Body>, ApiError> {
        let (parts, body) = req.into_parts();
        let bytes = to_bytes(body, self.max_body_size).await.map_err(|e| {
            if exceeds_length_limit(&e) {
                ApiError::PayloadTooLarge
            } else {
                ApiError::Internal(format!("Error reading request body: {}", e))
            }
        })?;

        let client_id = serde_json::from_slice::<ClientCredential>(&bytes)
            .map(|c| c.client_id)
            .unwrap_or_default();
        if client_id.is_empty() {
            return Err(ApiError::Validation("client_id is required".to_string()));
        }

        if let Err(err) = self.check(&client_id) {
            if let ApiError::Throttled(reason) = &err {
                tracing::warn!(
                    client_id = %client_id,
                    reason = reason.label(),
                    "Message throttled"
                );
                metrics::record_throttled(reason.label());
            }
            return Err(err);
        }

        Ok(Request::from_parts(parts, Body::from(bytes)))
    }
}

fn exceeds_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

impl Stage for AbuseGuard {
    fn name(&self) -> &'static str {
        "abuse_guard"
    }

    fn process(&self, req: Request<Body>, next: Next) -> BoxFuture<'_, Response> {
        async move {
            if req.method() != Method::POST {
                return next.run(req).await;
            }
            match self.guard(req).await {
                Ok(req) => next.run(req).await,
                Err(err) => err.into_response(),
            }
        }
        .boxed()
    }
}
