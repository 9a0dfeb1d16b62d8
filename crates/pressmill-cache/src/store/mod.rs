//! Remote store adapters.
//!
//! Every backend sits behind the same four-operation contract. Adapters
//! never raise past their boundary: a network or protocol failure is
//! recorded, the instance flips to its permanent disconnected state, and
//! the operation reports "skipped" (`None` / `false`).

use async_trait::async_trait;

pub mod file;
pub mod memcached;
pub mod redis;

pub use file::FileStore;
pub use memcached::MemcachedStore;
pub use redis::RedisStore;

/// Uniform contract over a remote key/value backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Backend identifier for diagnostics (`"redis"`, `"memcached"`,
    /// `"file"`).
    fn backend(&self) -> &'static str;

    /// Client/version descriptor for diagnostics.
    fn describe(&self) -> String;

    /// Whether the adapter is still willing to talk to the backend.
    fn is_connected(&self) -> bool;

    /// Key length cap imposed by the backend, in bytes.
    fn max_key_len(&self) -> Option<usize> {
        None
    }

    /// Fetch the transport value under a derived key. `None` when the
    /// key is absent, the adapter is disconnected, or the call failed.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a transport value. A TTL of 0 is replaced with the
    /// configured maximum. Returns whether the backend confirmed the
    /// write.
    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> bool;

    /// Delete the value under a derived key. Returns whether the call
    /// reached the backend successfully.
    async fn clear(&self, key: &str) -> bool;

    /// Clear the adapter's whole logical namespace. `true` only on full
    /// success.
    async fn flush(&self) -> bool;

    /// Accumulated failure record.
    fn errors(&self) -> Vec<String>;
}

/// Resolve the TTL actually sent to a backend: zero becomes the
/// configured maximum, larger requests are clamped to it.
pub(crate) fn effective_ttl(ttl_secs: u64, max_ttl: u64) -> u64 {
    if ttl_secs == 0 {
        max_ttl
    } else {
        ttl_secs.min(max_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_becomes_the_maximum() {
        assert_eq!(effective_ttl(0, 2_592_000), 2_592_000);
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        assert_eq!(effective_ttl(10_000_000, 2_592_000), 2_592_000);
        assert_eq!(effective_ttl(60, 2_592_000), 60);
    }
}
