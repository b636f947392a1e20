//! Configuration validation.
//!
//! Serde handles syntax; this checks values. All problems are reported at
//! once rather than stopping at the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.auth.bot_token.is_empty() && !config.auth.allow_dev_bypass {
        errors.push(ValidationError::new(
            "auth.bot_token",
            "must be set unless allow_dev_bypass is enabled",
        ));
    }

    let key_len = config.session.cookie_key.len();
    if !matches!(key_len, 16 | 24 | 32) {
        errors.push(ValidationError::new(
            "session.cookie_key",
            format!("must be 16, 24 or 32 bytes, got {}", key_len),
        ));
    }

    if config.session.cookie_name.is_empty() {
        errors.push(ValidationError::new("session.cookie_name", "must not be empty"));
    }

    if config.session.max_age_secs <= 0 {
        errors.push(ValidationError::new("session.max_age_secs", "must be positive"));
    }

    for origin in &config.cors.allowed_origins {
        if let Err(reason) = check_origin(origin) {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' {}", origin, reason),
            ));
        }
    }

    if config.abuse.max_total_messages == 0 {
        errors.push(ValidationError::new("abuse.max_total_messages", "must be > 0"));
    }
    if config.abuse.max_messages_per_window == 0 {
        errors.push(ValidationError::new(
            "abuse.max_messages_per_window",
            "must be > 0",
        ));
    }
    if config.abuse.window_secs == 0 {
        errors.push(ValidationError::new("abuse.window_secs", "must be > 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_origin(origin: &str) -> Result<(), &'static str> {
    let url = url::Url::parse(origin).map_err(|_| "is not a valid URL")?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("must use http or https");
    }
    if url.path() != "/" || origin.ends_with('/') || url.query().is_some() {
        return Err("must not contain a path or query");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.bot_token = "token".to_string();
        config.session.cookie_key = "0123456789abcdef".to_string();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid();
        config.auth.bot_token.clear();
        config.session.cookie_key = "short".to_string();
        config.abuse.window_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["auth.bot_token", "session.cookie_key", "abuse.window_secs"]
        );
    }

    #[test]
    fn test_dev_bypass_allows_empty_token() {
        let mut config = valid();
        config.auth.bot_token.clear();
        config.auth.allow_dev_bypass = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_origins() {
        assert!(check_origin("https://app.example.com").is_ok());
        assert!(check_origin("http://localhost:3030").is_ok());
        assert!(check_origin("https://app.example.com/").is_err());
        assert!(check_origin("https://app.example.com/path").is_err());
        assert!(check_origin("ftp://example.com").is_err());
        assert!(check_origin("*").is_err());
    }
}
