//! Package repository.
//!
//! The package directory is the authoritative source: `<slug>.zip` is
//! the download artifact and `<slug>.json` holds its metadata. Metadata
//! reads go through the cache facade, keyed on the slug and the
//! sidecar's modification time so a republished package invalidates
//! naturally. Cache failures fall through to the filesystem.

use anyhow::{bail, Context, Result};
use pressmill_cache::Cache;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::debug;

/// Repository over the package directory.
pub struct PackageRepository {
    dir: PathBuf,
    cache: Arc<dyn Cache>,
    metadata_ttl: u64,
    public_url: String,
}

impl PackageRepository {
    /// Create a repository rooted at `dir`, serving download links under
    /// `public_url`.
    pub fn new(
        dir: PathBuf,
        cache: Arc<dyn Cache>,
        metadata_ttl: u64,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            dir,
            cache,
            metadata_ttl,
            public_url: public_url.into(),
        }
    }

    /// Metadata for a package, or `None` when the slug is unknown.
    pub async fn metadata(&self, slug: &str) -> Result<Option<Value>> {
        let sidecar = self.dir.join(format!("{slug}.json"));

        let mtime = match fs::metadata(&sidecar).await {
            Ok(stat) => stat
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).context("stat package metadata"),
        };

        let key = format!("metadata-{slug}-{mtime}");
        if let Some(cached) = self.cache.get(&key).await {
            debug!(slug, "package metadata from cache");
            return Ok(Some(cached));
        }

        let raw = fs::read(&sidecar).await.context("read package metadata")?;
        let mut meta: Value =
            serde_json::from_slice(&raw).context("parse package metadata")?;
        if !meta.is_object() {
            bail!("package metadata for {slug} is not an object");
        }

        meta["slug"] = json!(slug);
        meta["download_url"] = json!(format!(
            "{}/updates?action=download&slug={slug}",
            self.public_url.trim_end_matches('/')
        ));

        self.cache.set(&key, meta.clone(), self.metadata_ttl).await;
        debug!(slug, "package metadata from disk");
        Ok(Some(meta))
    }

    /// Path of the package archive for a slug.
    pub fn archive_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.zip"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pressmill_cache::{CacheSettings, TieredCache};

    fn repository(dir: &std::path::Path) -> PackageRepository {
        let cache = Arc::new(TieredCache::local_only(&CacheSettings::default()));
        PackageRepository::new(
            dir.to_path_buf(),
            cache,
            3600,
            "http://localhost:8080/",
        )
    }

    #[tokio::test]
    async fn metadata_is_decorated_with_slug_and_download_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("plugin-x.json"),
            r#"{"name": "Plugin X", "version": "1.2"}"#,
        )
        .expect("sidecar");

        let repo = repository(dir.path());
        let meta = repo.metadata("plugin-x").await.expect("read").expect("some");

        assert_eq!(meta["name"], "Plugin X");
        assert_eq!(meta["slug"], "plugin-x");
        assert_eq!(
            meta["download_url"],
            "http://localhost:8080/updates?action=download&slug=plugin-x"
        );
    }

    #[tokio::test]
    async fn unknown_slug_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repository(dir.path());
        assert!(repo.metadata("ghost").await.expect("read").is_none());
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sidecar = dir.path().join("plugin-x.json");
        std::fs::write(&sidecar, r#"{"version": "1.2"}"#).expect("sidecar");

        let repo = repository(dir.path());
        let first = repo.metadata("plugin-x").await.expect("read").expect("some");

        // Change the sidecar without touching its mtime-derived key: the
        // cached copy keeps winning for the same (slug, mtime) pair.
        let second = repo.metadata("plugin-x").await.expect("read").expect("some");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn corrupt_sidecar_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("plugin-x.json"), b"{not json").expect("sidecar");
        let repo = repository(dir.path());
        assert!(repo.metadata("plugin-x").await.is_err());
    }

    #[test]
    fn archive_path_is_slug_scoped() {
        let repo = repository(std::path::Path::new("/srv/packages"));
        assert_eq!(
            repo.archive_path("plugin-x"),
            PathBuf::from("/srv/packages/plugin-x.zip")
        );
    }
}
