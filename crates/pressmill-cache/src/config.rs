//! Cache configuration types.
//!
//! Every setting has a fixed default so a partial configuration always
//! resolves. Defaults:
//!
//! | setting | default | effect |
//! |---------|---------|--------|
//! | `prefix` | `""` | key salt prepended to every derived key |
//! | `max_ttl_secs` | 2592000 (30 days) | TTL applied when a write asks for 0, and cap for larger requests |
//! | `binary_codec` | `false` | use MessagePack for every value instead of the tagged text format |
//! | `local_write_on_remote_failure` | `false` | populate the shadow tier even when the remote write failed |
//! | redis `host` / `port` | `127.0.0.1` / `6379` | backend address |
//! | redis `connect_timeout_ms` / `read_timeout_ms` | 1000 / 1000 | network budgets per operation |
//! | redis `retry_interval_ms` | none | accepted for compatibility; unused under the no-retry policy |
//! | redis `password` / `database` | none / 0 | AUTH credential and logical database index |
//! | redis `scheme` | `tcp` | `tcp`, `tls`, or `unix` (with `unix_socket_path`) |
//! | memcached `host` / `port` | `127.0.0.1` / `11211` | backend address |
//! | file `dir` | `./cache` | cache directory |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default TTL cap: 30 days.
pub const DEFAULT_MAX_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Backend-independent cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Key prefix ("salt") for every derived key.
    #[serde(default)]
    pub prefix: String,
    /// TTL assigned when a write asks for 0, and upper bound otherwise.
    #[serde(default = "default_max_ttl")]
    pub max_ttl_secs: u64,
    /// Use the alternate binary codec (MessagePack) unconditionally.
    #[serde(default)]
    pub binary_codec: bool,
    /// Populate the shadow tier even when the remote write failed.
    #[serde(default)]
    pub local_write_on_remote_failure: bool,
}

fn default_max_ttl() -> u64 {
    DEFAULT_MAX_TTL_SECS
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            max_ttl_secs: DEFAULT_MAX_TTL_SECS,
            binary_codec: false,
            local_write_on_remote_failure: false,
        }
    }
}

/// Connection scheme for the Redis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedisScheme {
    /// Plain TCP (`redis://`).
    #[default]
    Tcp,
    /// TLS (`rediss://`).
    Tls,
    /// Unix domain socket (`redis+unix://`).
    Unix,
}

/// Redis backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Backend host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Backend port.
    #[serde(default = "default_redis_port")]
    pub port: u16,
    /// Connection budget per operation.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Read budget per operation.
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Accepted for configuration compatibility; the adapter never
    /// retries within a process lifetime.
    #[serde(default)]
    pub retry_interval_ms: Option<u64>,
    /// AUTH credential.
    #[serde(default)]
    pub password: Option<String>,
    /// Logical database index.
    #[serde(default)]
    pub database: i64,
    /// Connection scheme.
    #[serde(default)]
    pub scheme: RedisScheme,
    /// Socket path for the `unix` scheme.
    #[serde(default)]
    pub unix_socket_path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_redis_port(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
            retry_interval_ms: None,
            password: None,
            database: 0,
            scheme: RedisScheme::Tcp,
            unix_socket_path: None,
        }
    }
}

impl RedisSettings {
    /// Connection budget as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read budget as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Build the connection URL for the configured scheme.
    pub fn connection_url(&self) -> String {
        let auth = match &self.password {
            Some(password) => format!(":{password}@"),
            None => String::new(),
        };
        match self.scheme {
            RedisScheme::Tcp => {
                format!("redis://{auth}{}:{}/{}", self.host, self.port, self.database)
            }
            RedisScheme::Tls => {
                format!("rediss://{auth}{}:{}/{}", self.host, self.port, self.database)
            }
            RedisScheme::Unix => {
                let path = self
                    .unix_socket_path
                    .as_deref()
                    .unwrap_or_else(|| std::path::Path::new("/var/run/redis/redis.sock"));
                let mut url = format!("redis+unix://{}?db={}", path.display(), self.database);
                if let Some(password) = &self.password {
                    url.push_str("&pass=");
                    url.push_str(password);
                }
                url
            }
        }
    }

    /// Address string for diagnostics, with the credential withheld.
    pub fn describe(&self) -> String {
        match self.scheme {
            RedisScheme::Tcp => format!("tcp {}:{}/{}", self.host, self.port, self.database),
            RedisScheme::Tls => format!("tls {}:{}/{}", self.host, self.port, self.database),
            RedisScheme::Unix => format!(
                "unix {}",
                self.unix_socket_path
                    .as_deref()
                    .unwrap_or_else(|| std::path::Path::new("/var/run/redis/redis.sock"))
                    .display()
            ),
        }
    }
}

/// Memcached backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemcachedSettings {
    /// Backend host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Backend port.
    #[serde(default = "default_memcached_port")]
    pub port: u16,
    /// Connection budget.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Read budget per operation.
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_memcached_port() -> u16 {
    11211
}

impl Default for MemcachedSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_memcached_port(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
        }
    }
}

impl MemcachedSettings {
    /// `host:port` address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection budget as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read budget as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// File backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSettings {
    /// Cache directory.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}
