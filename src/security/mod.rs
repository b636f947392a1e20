//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Login:
//!     → handshake.rs (verify signed payload, extract user)
//!     → session.rs (seal user id into the session cookie)
//!
//! Every request:
//!     → access_control.rs (cookie → SessionIdentity, never rejects)
//!
//! POST /api/message/:
//!     → abuse_guard.rs (lifetime and window caps per client credential)
//! ```
//!
//! # Design Decisions
//! - Nothing from the handshake is trusted before its hash verifies
//! - Undecodable cookies downgrade to anonymous instead of failing
//! - Quota counts come from shared storage, not process memory

pub mod abuse_guard;
pub mod access_control;
pub mod handshake;
pub mod session;

pub use abuse_guard::{AbuseGuard, AbuseLimits};
pub use access_control::{CookieFormat, SessionStage};
pub use handshake::{HandshakeError, HandshakeUser, HandshakeValidator};
pub use session::{SessionCodec, SessionCookieSettings};
