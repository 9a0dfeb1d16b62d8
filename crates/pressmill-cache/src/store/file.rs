//! File-backed store adapter.
//!
//! One file per derived key under the cache directory, named by the hex
//! SHA-256 of the key with a `.cache` extension. The body is a header
//! line holding the unix expiration time, followed by the raw transport
//! bytes. Expired and unreadable entries are removed on read and treated
//! as misses.
//!
//! Local-disk failures are recorded in diagnostics but do not flip the
//! one-way disconnect state; that machinery exists to stop repeated
//! network timeouts, which have no filesystem analogue.

use super::{effective_ttl, RemoteStore};
use crate::config::{CacheSettings, FileSettings};
use crate::error::{StoreError, StoreResult};
use crate::state::ConnectionState;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::debug;

const ENTRY_EXTENSION: &str = "cache";

/// Filesystem-backed remote store.
pub struct FileStore {
    dir: PathBuf,
    state: ConnectionState,
    max_ttl: u64,
}

impl FileStore {
    /// Create the store, ensuring the cache directory exists. This is
    /// the throwing construction path.
    pub async fn connect(settings: &FileSettings, cache: &CacheSettings) -> StoreResult<Self> {
        fs::create_dir_all(&settings.dir)
            .await
            .map_err(|err| StoreError::Config(format!("{}: {err}", settings.dir.display())))?;
        Ok(Self {
            dir: settings.dir.clone(),
            state: ConnectionState::new(format!("file ({})", settings.dir.display())),
            max_ttl: cache.max_ttl_secs,
        })
    }

    /// Create the store leniently: an unusable directory yields an
    /// adapter that is already disconnected, with the failure on record.
    pub async fn connect_lenient(settings: &FileSettings, cache: &CacheSettings) -> Self {
        match Self::connect(settings, cache).await {
            Ok(store) => store,
            Err(err) => Self {
                dir: settings.dir.clone(),
                state: ConnectionState::failed(
                    format!("file ({})", settings.dir.display()),
                    "connect",
                    err,
                ),
                max_ttl: cache.max_ttl_secs,
            },
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{digest}.{ENTRY_EXTENSION}"))
    }

    async fn remove_entry(path: &Path) {
        let _ = fs::remove_file(path).await;
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Split an entry body into its expiration header and payload.
fn parse_entry(body: &[u8]) -> Option<(u64, &[u8])> {
    let newline = body.iter().position(|b| *b == b'\n')?;
    let expires_at = std::str::from_utf8(&body[..newline]).ok()?.parse().ok()?;
    Some((expires_at, &body[newline + 1..]))
}

#[async_trait]
impl RemoteStore for FileStore {
    fn backend(&self) -> &'static str {
        "file"
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
        let path = self.entry_path(key);
        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                self.state.record_soft_failure("get", err);
                return None;
            }
        };
        match parse_entry(&body) {
            Some((expires_at, payload)) if expires_at > unix_now() => {
                debug!(key, "file cache hit");
                Some(payload.to_vec())
            }
            Some(_) => {
                // Expired; reap the entry.
                Self::remove_entry(&path).await;
                None
            }
            None => {
                self.state.record_soft_failure("get", "corrupt entry");
                Self::remove_entry(&path).await;
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let expires_at = unix_now() + effective_ttl(ttl_secs, self.max_ttl);
        let mut body = format!("{expires_at}\n").into_bytes();
        body.extend_from_slice(value);
        match fs::write(self.entry_path(key), body).await {
            Ok(()) => {
                debug!(key, expires_at, "file cache set");
                true
            }
            Err(err) => {
                self.state.record_soft_failure("set", err);
                false
            }
        }
    }

    async fn clear(&self, key: &str) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => {
                self.state.record_soft_failure("clear", err);
                false
            }
        }
    }

    async fn flush(&self) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) => {
                self.state.record_soft_failure("flush", err);
                return false;
            }
        };
        let mut ok = true;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    self.state.record_soft_failure("flush", err);
                    ok = false;
                    break;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Err(err) = fs::remove_file(&path).await {
                self.state.record_soft_failure("flush", err);
                ok = false;
            }
        }
        ok
    }

    fn errors(&self) -> Vec<String> {
        self.state.errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(dir: &Path) -> FileStore {
        let settings = FileSettings {
            dir: dir.to_path_buf(),
        };
        FileStore::connect(&settings, &CacheSettings::default())
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path()).await;

        assert!(store.set("site42:plugin-x", b"payload", 60).await);
        assert_eq!(
            store.get("site42:plugin-x").await,
            Some(b"payload".to_vec())
        );
        assert!(store.clear("site42:plugin-x").await);
        assert_eq!(store.get("site42:plugin-x").await, None);
    }

    #[tokio::test]
    async fn zero_ttl_gets_the_maximum() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path()).await;

        assert!(store.set("k", b"v", 0).await);
        let body = fs::read(store.entry_path("k")).await.expect("entry");
        let (expires_at, payload) = parse_entry(&body).expect("parse");
        assert_eq!(payload, b"v");
        // Far in the future, close to now + max_ttl.
        assert!(expires_at >= unix_now() + CacheSettings::default().max_ttl_secs - 5);
    }

    #[tokio::test]
    async fn expired_entries_miss_and_are_reaped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path()).await;

        let path = store.entry_path("k");
        fs::write(&path, b"1\nstale").await.expect("write");
        assert_eq!(store.get("k").await, None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_entries_miss_without_disconnecting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path()).await;

        fs::write(store.entry_path("k"), b"not a header").await.expect("write");
        assert_eq!(store.get("k").await, None);
        assert!(store.is_connected());
        assert!(!store.errors().is_empty());
    }

    #[tokio::test]
    async fn clear_of_missing_key_is_fine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path()).await;
        assert!(store.clear("never-written").await);
    }

    #[tokio::test]
    async fn flush_removes_only_cache_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path()).await;

        assert!(store.set("a", b"1", 60).await);
        assert!(store.set("b", b"2", 60).await);
        let unrelated = dir.path().join("keep.txt");
        fs::write(&unrelated, b"keep").await.expect("write");

        assert!(store.flush().await);
        assert_eq!(store.get("a").await, None);
        assert_eq!(store.get("b").await, None);
        assert!(unrelated.exists());
    }
}
