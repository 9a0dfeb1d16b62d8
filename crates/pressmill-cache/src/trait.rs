//! The cache contract consumed by the update server.

use async_trait::async_trait;
use serde_json::Value;

/// Cache contract: three operations, no failure modes.
///
/// Implementations absorb every backend failure; a broken cache looks
/// like an empty cache to the caller.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a value by logical key. `None` both for "never written"
    /// and "backend unavailable".
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store a value under a logical key. A TTL of 0 means "backend
    /// maximum", not "forever".
    async fn set(&self, key: &str, value: Value, ttl_secs: u64);

    /// Remove a value by logical key.
    async fn clear(&self, key: &str);
}
