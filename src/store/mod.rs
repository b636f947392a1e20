//! Persistence collaborators.
//!
//! # Data Flow
//! ```text
//! abuse guard  → MessageStore::count_by_client / count_by_client_since
//! handlers     → MessageStore::create / list_by_client
//!              → UserStore::upsert / get
//! ```
//!
//! # Design Decisions
//! - Counts are always read from the store; nothing is cached in-process
//! - Calls are synchronous and expected to return quickly
//! - Backends other than [`memory`] live outside this crate

pub mod memory;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::{InMemoryMessageStore, InMemoryUserStore};

use crate::security::handshake::HandshakeUser;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage query failed: {0}")]
    Query(String),
}

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub message: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a message.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub client_id: String,
    pub client_secret: String,
    pub message: String,
    pub name: String,
}

/// A persisted user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub language_code: String,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub trait MessageStore: Send + Sync {
    /// Total messages ever created for `client_id`.
    fn count_by_client(&self, client_id: &str) -> Result<u64, StoreError>;

    /// Messages created for `client_id` within the trailing `window`.
    fn count_by_client_since(&self, client_id: &str, window: Duration)
        -> Result<u64, StoreError>;

    fn create(&self, new: NewMessage) -> Result<Message, StoreError>;

    fn list_by_client(&self, client_id: &str) -> Result<Vec<Message>, StoreError>;
}

pub trait UserStore: Send + Sync {
    /// Insert the profile or refresh an existing one, keeping `created_at`.
    fn upsert(&self, profile: HandshakeUser) -> Result<User, StoreError>;

    fn get(&self, id: i64) -> Result<Option<User>, StoreError>;
}
