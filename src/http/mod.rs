//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (router assembly, tracing span)
//!     → pipeline.rs (ordered stages)
//!         request.rs → middleware/* → security session stage
//!     → [abuse guard on POST /api/message/]
//!     → handlers.rs
//!     → response.rs (JSON error envelope)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use handlers::AppState;
pub use pipeline::{Pipeline, PipelineBuilder, Stage};
pub use request::{RequestContext, RequestContextExt, RequestId, SessionIdentity, X_REQUEST_ID};
pub use response::ApiError;
pub use server::HttpServer;
