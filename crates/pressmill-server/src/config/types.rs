//! Server configuration types.

use pressmill_cache::{CacheSettings, FileSettings, MemcachedSettings, RedisSettings};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binding configuration.
    #[serde(default)]
    pub server: ServerBindConfig,
    /// Package repository configuration.
    #[serde(default)]
    pub packages: PackagesConfig,
    /// License authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerBindConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used when building download links.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerBindConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerBindConfig {
    /// Bind address.
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }
}

/// Package repository configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// Directory holding `<slug>.zip` archives and `<slug>.json`
    /// metadata sidecars.
    #[serde(default = "default_packages_dir")]
    pub dir: PathBuf,
    /// TTL for cached package metadata.
    #[serde(default = "default_metadata_ttl")]
    pub metadata_ttl_secs: u64,
}

fn default_packages_dir() -> PathBuf {
    PathBuf::from("./packages")
}

fn default_metadata_ttl() -> u64 {
    3600
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            dir: default_packages_dir(),
            metadata_ttl_secs: default_metadata_ttl(),
        }
    }
}

/// License authentication configuration. The license key presented by
/// clients is the HTTP Basic credential for `secret_id:secret_string`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared-secret identifier.
    #[serde(default = "default_secret_id")]
    pub secret_id: String,
    /// Shared-secret value.
    #[serde(default = "default_secret_string")]
    pub secret_string: String,
}

fn default_secret_id() -> String {
    "998".to_string()
}

fn default_secret_string() -> String {
    "123openup".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_id: default_secret_id(),
            secret_string: default_secret_string(),
        }
    }
}

/// Which remote tier backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Shadow tier only, nothing remote.
    None,
    /// File-per-entry cache on the local filesystem.
    #[default]
    File,
    /// Redis.
    Redis,
    /// Memcached.
    Memcached,
}

/// Cache configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: CacheBackendKind,
    /// Backend-independent settings (prefix, TTL cap, codec).
    #[serde(flatten)]
    pub settings: CacheSettings,
    /// Redis backend settings.
    #[serde(default)]
    pub redis: RedisSettings,
    /// Memcached backend settings.
    #[serde(default)]
    pub memcached: MemcachedSettings,
    /// File backend settings.
    #[serde(default)]
    pub file: FileSettings,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.packages.metadata_ttl_secs, 3600);
        assert_eq!(config.cache.backend, CacheBackendKind::File);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_toml_deserializes() {
        let config: ServerConfig = toml_from_str(
            r#"
            [server]
            port = 9090

            [cache]
            backend = "redis"
            prefix = "site42"

            [cache.redis]
            host = "cache.internal"
            "#,
        );
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
        assert_eq!(config.cache.settings.prefix, "site42");
        assert_eq!(config.cache.redis.host, "cache.internal");
        assert_eq!(config.cache.redis.port, 6379);
    }

    fn toml_from_str(raw: &str) -> ServerConfig {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize")
    }

    #[test]
    fn socket_addr_parses() {
        let bind = ServerBindConfig {
            host: "127.0.0.1".to_string(),
            ..Default::default()
        };
        assert_eq!(bind.socket_addr().port(), 8080);
    }
}
