//! Mini-app authentication gateway.
//!
//! Verifies signed handshake payloads from the chat client, turns the
//! verified user into an encrypted session cookie, and guards the message
//! endpoint with per-credential caps. Every request passes through one
//! ordered pipeline of stages.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod store;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
