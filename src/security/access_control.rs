//! Session extraction.
//!
//! Reads the session cookie and, when it decodes, attaches a
//! [`SessionIdentity`] to the request context. Decoding tries each
//! [`CookieFormat`] in order; if none matches the request continues
//! anonymously. This stage never rejects a request.

use axum::{
    body::Body,
    extract::Request,
    http::header,
    middleware::Next,
    response::Response,
};
use cookie::Cookie;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::pipeline::Stage;
use crate::http::request::{RequestContextExt, SessionIdentity};
use crate::observability::metrics;
use crate::security::session::SessionCodec;

/// Ways a session cookie value may be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieFormat {
    /// AEAD-sealed user id produced by [`SessionCodec`].
    Encrypted,
    /// Bare decimal user id written by older deployments.
    LegacyPlaintext,
}

impl CookieFormat {
    pub fn label(&self) -> &'static str {
        match self {
            CookieFormat::Encrypted => "encrypted",
            CookieFormat::LegacyPlaintext => "legacy_plaintext",
        }
    }

    fn decode(&self, codec: &SessionCodec, value: &str) -> Option<i64> {
        match self {
            CookieFormat::Encrypted => codec.decrypt(value).ok(),
            CookieFormat::LegacyPlaintext => value.parse().ok(),
        }
    }
}

#[derive(Clone)]
pub struct SessionStage {
    codec: SessionCodec,
    cookie_name: String,
    formats: Vec<CookieFormat>,
}

impl SessionStage {
    pub fn new(codec: SessionCodec, cookie_name: impl Into<String>, accept_legacy: bool) -> Self {
        let mut formats = vec![CookieFormat::Encrypted];
        if accept_legacy {
            formats.push(CookieFormat::LegacyPlaintext);
        }
        Self {
            codec,
            cookie_name: cookie_name.into(),
            formats,
        }
    }

    pub fn formats(&self) -> &[CookieFormat] {
        &self.formats
    }

    /// Decode a raw cookie value, returning the id and the format that matched.
    pub fn decode(&self, value: &str) -> Option<(i64, CookieFormat)> {
        self.formats
            .iter()
            .find_map(|format| format.decode(&self.codec, value).map(|id| (id, *format)))
    }

    fn cookie_value(&self, req: &Request<Body>) -> Option<String> {
        req.headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.cookie_name)
            .map(|cookie| cookie.value().to_string())
    }
}

impl Stage for SessionStage {
    fn name(&self) -> &'static str {
        "session"
    }

    fn process(&self, mut req: Request<Body>, next: Next) -> BoxFuture<'_, Response> {
        async move {
            if let Some(value) = self.cookie_value(&req) {
                match self.decode(&value) {
                    Some((user_id, format)) => {
                        tracing::debug!(user_id, format = format.label(), "Session attached");
                        metrics::record_session(format.label());
                        match req.context_mut() {
                            Some(ctx) => ctx.attach_identity(SessionIdentity { user_id }),
                            None => tracing::error!("Session stage ran before request ID stage"),
                        }
                    }
                    None => tracing::debug!("Session cookie not decodable, continuing anonymously"),
                }
            }
            next.run(req).await
        }
        .boxed()
    }
}
