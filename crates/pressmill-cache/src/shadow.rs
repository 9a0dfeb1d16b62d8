//! In-process shadow cache.
//!
//! The shadow tier mirrors every value written to or read from the remote
//! tier during the process lifetime. It has no expiry and no size bound;
//! its job is to keep repeated lookups for the same derived key off the
//! network. Values are cloned on the way in and on the way out, so a
//! caller mutating what it got back can never corrupt the cached snapshot.

use dashmap::DashMap;
use serde_json::Value;

/// Process-scoped map from derived key to cached value.
#[derive(Debug, Default)]
pub struct ShadowCache {
    entries: DashMap<String, Value>,
}

impl ShadowCache {
    /// An empty shadow cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a defensive copy of `value` under `key`.
    pub fn put(&self, key: &str, value: &Value) {
        self.entries.insert(key.to_string(), value.clone());
    }

    /// Defensive copy of the value under `key`, if any.
    pub fn try_get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Drop the entry under `key`.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every entry.
    pub fn clear_all(&self) {
        self.entries.clear();
    }

    /// Number of shadowed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the shadow is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate serialized size of everything currently shadowed.
    pub fn byte_size(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| {
                serde_json::to_vec(entry.value())
                    .map(|bytes| bytes.len())
                    .unwrap_or(0)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get_returns_value() {
        let shadow = ShadowCache::new();
        shadow.put("k", &json!({"v": 1}));
        assert_eq!(shadow.try_get("k"), Some(json!({"v": 1})));
        assert_eq!(shadow.try_get("missing"), None);
    }

    #[test]
    fn returned_value_is_a_copy() {
        let shadow = ShadowCache::new();
        shadow.put("k", &json!({"v": 1}));

        let mut fetched = shadow.try_get("k").expect("hit");
        fetched["v"] = json!(999);

        // The cached snapshot is unaffected by caller mutation.
        assert_eq!(shadow.try_get("k"), Some(json!({"v": 1})));
    }

    #[test]
    fn remove_and_clear() {
        let shadow = ShadowCache::new();
        shadow.put("a", &json!(1));
        shadow.put("b", &json!(2));
        shadow.remove("a");
        assert_eq!(shadow.try_get("a"), None);
        assert_eq!(shadow.len(), 1);
        shadow.clear_all();
        assert!(shadow.is_empty());
    }

    #[test]
    fn byte_size_counts_serialized_entries() {
        let shadow = ShadowCache::new();
        assert_eq!(shadow.byte_size(), 0);
        shadow.put("k", &json!({"version": "1.2"}));
        assert!(shadow.byte_size() >= r#"{"version":"1.2"}"#.len());
    }
}
