//! Configuration validation.

use super::types::ServerConfig;
use thiserror::Error;

/// Problems a configuration can have.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The bind port is unusable.
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    /// The license secret id is empty.
    #[error("Auth secret id must not be empty")]
    EmptySecretId,

    /// The license secret string is empty.
    #[error("Auth secret string must not be empty")]
    EmptySecretString,

    /// The public URL cannot produce download links.
    #[error("Invalid public URL: {0}")]
    InvalidPublicUrl(String),

    /// The log level is not one tracing understands.
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

/// Validate server configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    }

    if config.auth.secret_id.is_empty() {
        errors.push(ConfigError::EmptySecretId);
    }
    if config.auth.secret_string.is_empty() {
        errors.push(ConfigError::EmptySecretString);
    }

    let public_url = &config.server.public_url;
    if !public_url.starts_with("http://") && !public_url.starts_with("https://") {
        errors.push(ConfigError::InvalidPublicUrl(public_url.clone()));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
