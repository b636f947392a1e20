//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Handshake validation settings.
    pub auth: AuthConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Message quota and rate settings.
    pub abuse: AbuseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request size limits.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Handshake validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Bot token the handshake secret is derived from.
    pub bot_token: String,

    /// Accept the literal "dev" payload. Local development only.
    pub allow_dev_bypass: bool,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Raw AES key; must be 16, 24 or 32 bytes long.
    pub cookie_key: String,

    /// Cookie name.
    pub cookie_name: String,

    /// Cookie lifetime in seconds.
    pub max_age_secs: i64,

    /// Accept cookies holding a bare decimal user id.
    pub accept_legacy_plaintext: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_key: String::new(),
            cookie_name: "user_id".to_string(),
            max_age_secs: 30 * 24 * 60 * 60,
            accept_legacy_plaintext: true,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins reflected in `Access-Control-Allow-Origin`.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3030".to_string()],
        }
    }
}

/// Message creation limits, per client credential.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AbuseConfig {
    /// Maximum messages ever created.
    pub max_total_messages: u64,

    /// Maximum messages within the sliding window.
    pub max_messages_per_window: u64,

    /// Sliding window length in seconds.
    pub window_secs: u64,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            max_total_messages: 10,
            max_messages_per_window: 5,
            window_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}
