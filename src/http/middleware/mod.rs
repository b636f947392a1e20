//! Cross-cutting pipeline stages.
//!
//! # Data Flow
//! ```text
//! request_id (http/request.rs)
//!     → access_log.rs (entry/exit events, request metrics)
//!     → cors.rs (origin policy, preflight short-circuit)
//!     → panic.rs (turn handler panics into 500)
//!     → content_type.rs (JSON-only bodies)
//!     → session extraction (security/access_control.rs)
//!     → handler
//! ```

pub mod access_log;
pub mod content_type;
pub mod cors;
pub mod panic;

pub use access_log::AccessLogStage;
pub use content_type::ContentTypeStage;
pub use cors::CorsStage;
pub use panic::PanicRecoveryStage;
