//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (per-request span carrying the request ID)
//!
//! Consumers:
//!     → Log aggregation (stdout, plain or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - No global logger handle; context travels on the request span
//! - Request ID flows through every event emitted while handling a request
//! - Metrics are cheap (atomic increments) and safe to call when no exporter is installed

pub mod logging;
pub mod metrics;
pub mod tracing;
