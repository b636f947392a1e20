//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`AppConfig`].
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be applied.
    #[error("Invalid environment variable {name}: {reason}")]
    Env { name: &'static str, reason: String },

    /// One or more semantic checks failed.
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay values from the environment. `lookup` returns the variable's
/// value, if set.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(token) = lookup("BOT_TOKEN") {
        config.auth.bot_token = token;
    }

    if let Some(key) = lookup("COOKIE_ENCRYPTION_KEY") {
        config.session.cookie_key = key;
    }

    if let Some(port) = lookup("BACKEND_PORT") {
        let port: u16 = port.parse().map_err(|_| ConfigError::Env {
            name: "BACKEND_PORT",
            reason: format!("'{}' is not a port number", port),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(origins) = lookup("CORS_ALLOWED_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [auth]
            bot_token = "abc"

            [abuse]
            window_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.auth.bot_token, "abc");
        assert_eq!(config.abuse.window_secs, 30);
        assert_eq!(config.abuse.max_total_messages, 10);
        assert_eq!(config.session.cookie_name, "user_id");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("BOT_TOKEN", "tok"),
                ("COOKIE_ENCRYPTION_KEY", "0123456789abcdef"),
                ("BACKEND_PORT", "9000"),
                ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ]),
        )
        .unwrap();

        assert_eq!(config.auth.bot_token, "tok");
        assert_eq!(config.session.cookie_key, "0123456789abcdef");
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_bad_port_rejected() {
        let mut config = AppConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("BACKEND_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { name: "BACKEND_PORT", .. }));
    }

    #[test]
    fn test_empty_env_ignored() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, env(&[("BOT_TOKEN", "")])).unwrap();
        assert!(config.auth.bot_token.is_empty());
    }
}
