//! The tiered cache facade.
//!
//! Composes the key deriver, value codec, shadow tier, and an optional
//! remote store behind the [`Cache`] contract. Lookup order is shadow
//! first, then remote; a value fetched from the remote tier is promoted
//! into the shadow so the network is hit at most once per key per
//! process lifetime.
//!
//! The facade itself never fails: remote unavailability degrades every
//! operation to a miss or a no-op.

use crate::codec::ValueCodec;
use crate::config::CacheSettings;
use crate::key::KeyDeriver;
use crate::r#trait::Cache;
use crate::shadow::ShadowCache;
use crate::store::RemoteStore;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Diagnostic snapshot of the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    /// Backend description, or `"none"` for a shadow-only cache.
    pub backend: String,
    /// Whether the remote tier is still usable.
    pub connected: bool,
    /// Number of shadowed entries.
    pub entries: usize,
    /// Approximate serialized size of the shadowed entries.
    pub bytes: usize,
    /// Accumulated remote failure record.
    pub errors: Vec<String>,
}

/// Shadow tier plus optional remote tier behind the [`Cache`] contract.
pub struct TieredCache {
    deriver: KeyDeriver,
    codec: ValueCodec,
    shadow: ShadowCache,
    remote: Option<Box<dyn RemoteStore>>,
    local_write_on_remote_failure: bool,
}

impl TieredCache {
    /// A cache with no remote tier: the shadow map is the only storage.
    pub fn local_only(settings: &CacheSettings) -> Self {
        Self {
            deriver: KeyDeriver::new(settings.prefix.clone(), None),
            codec: ValueCodec::new(settings.binary_codec),
            shadow: ShadowCache::new(),
            remote: None,
            local_write_on_remote_failure: settings.local_write_on_remote_failure,
        }
    }

    /// A cache backed by a remote store.
    pub fn with_remote(settings: &CacheSettings, remote: Box<dyn RemoteStore>) -> Self {
        Self {
            deriver: KeyDeriver::new(settings.prefix.clone(), remote.max_key_len()),
            codec: ValueCodec::new(settings.binary_codec),
            shadow: ShadowCache::new(),
            remote: Some(remote),
            local_write_on_remote_failure: settings.local_write_on_remote_failure,
        }
    }

    /// Backend identifier for diagnostics.
    pub fn backend(&self) -> &'static str {
        self.remote.as_ref().map_or("none", |r| r.backend())
    }

    /// Whether the remote tier exists and is still usable.
    pub fn is_remote_connected(&self) -> bool {
        self.remote.as_ref().is_some_and(|r| r.is_connected())
    }

    /// Diagnostic snapshot: shadow size plus the remote failure record.
    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            backend: self
                .remote
                .as_ref()
                .map_or_else(|| "none".to_string(), |r| r.describe()),
            connected: self.is_remote_connected(),
            entries: self.shadow.len(),
            bytes: self.shadow.byte_size(),
            errors: self
                .remote
                .as_ref()
                .map_or_else(Vec::new, |r| r.errors()),
        }
    }

    /// Cache-wide invalidation: clears the shadow tier, then the remote
    /// namespace. `true` only on full success.
    pub async fn flush(&self) -> bool {
        self.shadow.clear_all();
        match &self.remote {
            Some(remote) => remote.flush().await,
            None => true,
        }
    }
}

#[async_trait]
impl Cache for TieredCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let derived = self.deriver.derive(key);

        if let Some(value) = self.shadow.try_get(&derived) {
            debug!(key, "cache hit (shadow)");
            return Some(value);
        }

        let remote = self.remote.as_ref()?;
        if !remote.is_connected() {
            return None;
        }

        let raw = remote.get(&derived).await?;
        let value = self.codec.decode(&raw);
        debug!(key, "cache hit (remote)");
        self.shadow.put(&derived, &value);
        Some(value)
    }

    async fn set(&self, key: &str, value: Value, ttl_secs: u64) {
        let derived = self.deriver.derive(key);

        let Some(remote) = self.remote.as_ref() else {
            // Shadow-only cache: the shadow is the storage.
            self.shadow.put(&derived, &value);
            return;
        };

        let written = if remote.is_connected() {
            let encoded = self.codec.encode(&value);
            remote.set(&derived, &encoded, ttl_secs).await
        } else {
            false
        };

        // The shadow holds the original value, not the round-tripped
        // representation, and only once the remote confirmed the write —
        // the local tier reflects confirmed remote state.
        if written || self.local_write_on_remote_failure {
            self.shadow.put(&derived, &value);
        }
        debug!(key, written, "cache set");
    }

    async fn clear(&self, key: &str) {
        let derived = self.deriver.derive(key);
        self.shadow.remove(&derived);
        if let Some(remote) = self.remote.as_ref() {
            if remote.is_connected() {
                remote.clear(&derived).await;
            }
        }
        debug!(key, "cache clear");
    }
}
