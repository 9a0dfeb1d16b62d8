//! Redis store adapter.
//!
//! A fresh async connection is taken from the client for every operation;
//! there is no pool. Each network call runs under the configured
//! connect/read budget, and the first failure of any kind flips the
//! adapter into its permanent disconnected state.

use super::{effective_ttl, RemoteStore};
use crate::config::{CacheSettings, RedisSettings};
use crate::error::{StoreError, StoreResult};
use crate::state::ConnectionState;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Redis-backed remote store.
pub struct RedisStore {
    client: Option<redis::Client>,
    state: ConnectionState,
    prefix: String,
    max_ttl: u64,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl RedisStore {
    /// Connect to Redis, verifying the backend answers a PING within the
    /// connection budget. This is the throwing construction path.
    pub async fn connect(settings: &RedisSettings, cache: &CacheSettings) -> StoreResult<Self> {
        let store = Self::build(settings, cache)?;
        store.ping().await.map_err(StoreError::Connection)?;
        Ok(store)
    }

    /// Connect leniently: a backend that cannot be reached yields an
    /// adapter that is already disconnected, with the failure on record.
    pub async fn connect_lenient(settings: &RedisSettings, cache: &CacheSettings) -> Self {
        let store = match Self::build(settings, cache) {
            Ok(store) => store,
            Err(err) => {
                return Self {
                    client: None,
                    state: ConnectionState::failed(descriptor(settings), "connect", err),
                    prefix: cache.prefix.clone(),
                    max_ttl: cache.max_ttl_secs,
                    connect_timeout: settings.connect_timeout(),
                    read_timeout: settings.read_timeout(),
                }
            }
        };
        if let Err(err) = store.ping().await {
            store.state.record_failure("connect", err);
        }
        store
    }

    fn build(settings: &RedisSettings, cache: &CacheSettings) -> StoreResult<Self> {
        let url = settings.connection_url();
        let client = redis::Client::open(url.as_str())
            .map_err(|err| StoreError::Config(err.to_string()))?;
        Ok(Self {
            client: Some(client),
            state: ConnectionState::new(descriptor(settings)),
            prefix: cache.prefix.clone(),
            max_ttl: cache.max_ttl_secs,
            connect_timeout: settings.connect_timeout(),
            read_timeout: settings.read_timeout(),
        })
    }

    async fn ping(&self) -> Result<(), String> {
        let mut conn = self.raw_connection().await?;
        match timeout(
            self.read_timeout,
            redis::cmd("PING").query_async::<_, String>(&mut conn),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err("ping timed out".to_string()),
        }
    }

    async fn raw_connection(&self) -> Result<redis::aio::Connection, String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| "no client".to_string())?;
        match timeout(self.connect_timeout, client.get_async_connection()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err("connection timed out".to_string()),
        }
    }

    /// A connection for one operation, or `None` with the failure
    /// recorded and the adapter disconnected.
    async fn connection(&self, op: &str) -> Option<redis::aio::Connection> {
        match self.raw_connection().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                self.state.record_failure(op, err);
                None
            }
        }
    }

    fn flush_pattern(&self) -> String {
        if self.prefix.is_empty() {
            "*".to_string()
        } else {
            format!("{}:*", self.prefix)
        }
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    fn describe(&self) -> String {
        self.state.descriptor().to_string()
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if !self.state.is_connected() {
            return None;
        }
        let mut conn = self.connection("get").await?;
        match timeout(self.read_timeout, conn.get::<_, Option<Vec<u8>>>(key)).await {
            Ok(Ok(value)) => {
                debug!(key, hit = value.is_some(), "redis get");
                value
            }
            Ok(Err(err)) => {
                self.state.record_failure("get", err);
                None
            }
            Err(_) => {
                self.state.record_failure("get", "read timed out");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let Some(mut conn) = self.connection("set").await else {
            return false;
        };
        let ttl = effective_ttl(ttl_secs, self.max_ttl);
        match timeout(
            self.read_timeout,
            conn.set_ex::<_, _, ()>(key, value, ttl),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(key, ttl_secs = ttl, "redis set");
                true
            }
            Ok(Err(err)) => {
                self.state.record_failure("set", err);
                false
            }
            Err(_) => {
                self.state.record_failure("set", "write timed out");
                false
            }
        }
    }

    async fn clear(&self, key: &str) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let Some(mut conn) = self.connection("clear").await else {
            return false;
        };
        match timeout(self.read_timeout, conn.del::<_, i64>(key)).await {
            Ok(Ok(_)) => {
                debug!(key, "redis del");
                true
            }
            Ok(Err(err)) => {
                self.state.record_failure("clear", err);
                false
            }
            Err(_) => {
                self.state.record_failure("clear", "write timed out");
                false
            }
        }
    }

    async fn flush(&self) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let Some(mut conn) = self.connection("flush").await else {
            return false;
        };
        let pattern = self.flush_pattern();
        let keys = match timeout(self.read_timeout, conn.keys::<_, Vec<String>>(&pattern)).await {
            Ok(Ok(keys)) => keys,
            Ok(Err(err)) => {
                self.state.record_failure("flush", err);
                return false;
            }
            Err(_) => {
                self.state.record_failure("flush", "read timed out");
                return false;
            }
        };
        if keys.is_empty() {
            return true;
        }
        match timeout(self.read_timeout, conn.del::<_, i64>(&keys)).await {
            Ok(Ok(deleted)) => {
                debug!(pattern = %pattern, deleted, "redis flush");
                true
            }
            Ok(Err(err)) => {
                self.state.record_failure("flush", err);
                false
            }
            Err(_) => {
                self.state.record_failure("flush", "write timed out");
                false
            }
        }
    }

    fn errors(&self) -> Vec<String> {
        self.state.errors()
    }
}

fn descriptor(settings: &RedisSettings) -> String {
    format!("redis ({})", settings.describe())
}
