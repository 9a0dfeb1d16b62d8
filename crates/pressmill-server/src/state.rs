//! Shared application state.

use crate::config::{CacheBackendKind, CacheConfig, ServerConfig};
use crate::license::License;
use crate::packages::PackageRepository;
use anyhow::Result;
use pressmill_cache::{FileStore, MemcachedStore, RedisStore, TieredCache};
use std::sync::Arc;
use tracing::info;

/// State shared across request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration.
    pub config: Arc<ServerConfig>,
    /// The tiered metadata cache.
    pub cache: Arc<TieredCache>,
    /// Package repository.
    pub packages: Arc<PackageRepository>,
    /// License validator.
    pub license: Arc<License>,
}

impl AppState {
    /// Build the state: cache backend (lenient — an unreachable backend
    /// degrades instead of failing startup), package repository, and
    /// license.
    pub async fn new(config: &ServerConfig) -> Result<Self> {
        let cache = Arc::new(build_cache(&config.cache).await);
        info!(
            backend = cache.backend(),
            connected = cache.is_remote_connected(),
            "cache ready"
        );

        let packages = Arc::new(PackageRepository::new(
            config.packages.dir.clone(),
            cache.clone(),
            config.packages.metadata_ttl_secs,
            config.server.public_url.clone(),
        ));
        let license = Arc::new(License::new(
            &config.auth.secret_id,
            &config.auth.secret_string,
        ));

        Ok(Self {
            config: Arc::new(config.clone()),
            cache,
            packages,
            license,
        })
    }
}

async fn build_cache(config: &CacheConfig) -> TieredCache {
    match config.backend {
        CacheBackendKind::None => TieredCache::local_only(&config.settings),
        CacheBackendKind::File => {
            let store = FileStore::connect_lenient(&config.file, &config.settings).await;
            TieredCache::with_remote(&config.settings, Box::new(store))
        }
        CacheBackendKind::Redis => {
            let store = RedisStore::connect_lenient(&config.redis, &config.settings).await;
            TieredCache::with_remote(&config.settings, Box::new(store))
        }
        CacheBackendKind::Memcached => {
            let store = MemcachedStore::connect_lenient(&config.memcached, &config.settings).await;
            TieredCache::with_remote(&config.settings, Box::new(store))
        }
    }
}
