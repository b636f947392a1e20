//! Per-request tracing span.
//!
//! The span is opened by `TraceLayer` before the pipeline runs, with an empty
//! `request_id` field that the request ID stage fills in. Every event logged
//! while the request is in flight inherits these fields.

use axum::{body::Body, extract::Request};
use tracing::Span;

pub fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = tracing::field::Empty,
    )
}
