//! Memcached store adapter.
//!
//! Speaks the memcached ASCII protocol over a single TCP connection.
//! Writes try an update-only `replace` first and fall back to an
//! unconditional `set` when the key did not exist, since the backend has
//! no native upsert with that shape. Keys are capped at 250 bytes.
//!
//! The protocol functions are generic over the stream so they can be
//! exercised against scripted streams in tests.

use super::{effective_ttl, RemoteStore};
use crate::config::{CacheSettings, MemcachedSettings};
use crate::error::{StoreError, StoreResult};
use crate::state::ConnectionState;
use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::BufStream;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

/// Key length cap imposed by the backend.
pub const MAX_KEY_LEN: usize = 250;

/// Relative expirations above this are interpreted by the backend as
/// unix timestamps, so larger TTLs must be sent as absolute times.
const RELATIVE_TTL_LIMIT: u64 = 60 * 60 * 24 * 30;

/// Memcached-backed remote store.
pub struct MemcachedStore {
    conn: Mutex<Option<BufStream<TcpStream>>>,
    state: ConnectionState,
    max_ttl: u64,
    read_timeout: Duration,
}

impl MemcachedStore {
    /// Connect to memcached and confirm the backend answers a `version`
    /// request. This is the throwing construction path.
    pub async fn connect(
        settings: &MemcachedSettings,
        cache: &CacheSettings,
    ) -> StoreResult<Self> {
        let addr = settings.address();
        let stream = match timeout(settings.connect_timeout(), TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(StoreError::Connection(err.to_string())),
            Err(_) => return Err(StoreError::Connection("connection timed out".to_string())),
        };
        let mut stream = BufStream::new(stream);
        let version = match timeout(settings.read_timeout(), proto::version(&mut stream)).await {
            Ok(Ok(version)) => version,
            Ok(Err(err)) => return Err(StoreError::Protocol(err.to_string())),
            Err(_) => return Err(StoreError::Connection("version timed out".to_string())),
        };
        Ok(Self {
            conn: Mutex::new(Some(stream)),
            state: ConnectionState::new(format!("memcached/{version} ({addr})")),
            max_ttl: cache.max_ttl_secs,
            read_timeout: settings.read_timeout(),
        })
    }

    /// Connect leniently: an unreachable backend yields an adapter that
    /// is already disconnected, with the failure on record.
    pub async fn connect_lenient(settings: &MemcachedSettings, cache: &CacheSettings) -> Self {
        match Self::connect(settings, cache).await {
            Ok(store) => store,
            Err(err) => Self {
                conn: Mutex::new(None),
                state: ConnectionState::failed(
                    format!("memcached ({})", settings.address()),
                    "connect",
                    err,
                ),
                max_ttl: cache.max_ttl_secs,
                read_timeout: settings.read_timeout(),
            },
        }
    }

    /// Expiration field for a write: TTL 0 and oversized TTLs resolve to
    /// the configured maximum; anything past the protocol's relative
    /// limit is sent as an absolute unix time.
    fn exptime(&self, ttl_secs: u64) -> u64 {
        let ttl = effective_ttl(ttl_secs, self.max_ttl);
        if ttl > RELATIVE_TTL_LIMIT {
            unix_now() + ttl
        } else {
            ttl
        }
    }

    /// Drop the dead connection and record the failure.
    fn fail(&self, conn: &mut Option<BufStream<TcpStream>>, op: &str, err: impl std::fmt::Display) {
        *conn = None;
        self.state.record_failure(op, err);
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl RemoteStore for MemcachedStore {
    fn backend(&self) -> &'static str {
        "memcached"
    }

    fn describe(&self) -> String {
        self.state.descriptor().to_string()
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn max_key_len(&self) -> Option<usize> {
        Some(MAX_KEY_LEN)
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if !self.state.is_connected() {
            return None;
        }
        let mut guard = self.conn.lock().await;
        let stream = guard.as_mut()?;
        let result = timeout(self.read_timeout, proto::get(stream, key)).await;
        match result {
            Ok(Ok(value)) => {
                debug!(key, hit = value.is_some(), "memcached get");
                value
            }
            Ok(Err(err)) => {
                self.fail(&mut guard, "get", err);
                None
            }
            Err(_) => {
                self.fail(&mut guard, "get", "read timed out");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let exptime = self.exptime(ttl_secs);
        let mut guard = self.conn.lock().await;
        let Some(stream) = guard.as_mut() else {
            return false;
        };
        // Update-only write first; unconditional write when the key did
        // not exist.
        let result = timeout(self.read_timeout, async {
            if proto::store(stream, "replace", key, value, exptime).await? {
                return Ok(true);
            }
            proto::store(stream, "set", key, value, exptime).await
        })
        .await;
        match result {
            Ok(Ok(stored)) => {
                debug!(key, exptime, stored, "memcached set");
                stored
            }
            Ok(Err(err)) => {
                self.fail(&mut guard, "set", err);
                false
            }
            Err(_) => {
                self.fail(&mut guard, "set", "write timed out");
                false
            }
        }
    }

    async fn clear(&self, key: &str) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let mut guard = self.conn.lock().await;
        let Some(stream) = guard.as_mut() else {
            return false;
        };
        let result = timeout(self.read_timeout, proto::delete(stream, key)).await;
        match result {
            Ok(Ok(_existed)) => {
                debug!(key, "memcached delete");
                true
            }
            Ok(Err(err)) => {
                self.fail(&mut guard, "clear", err);
                false
            }
            Err(_) => {
                self.fail(&mut guard, "clear", "write timed out");
                false
            }
        }
    }

    async fn flush(&self) -> bool {
        if !self.state.is_connected() {
            return false;
        }
        let mut guard = self.conn.lock().await;
        let Some(stream) = guard.as_mut() else {
            return false;
        };
        let result = timeout(self.read_timeout, proto::flush_all(stream)).await;
        match result {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                self.fail(&mut guard, "flush", err);
                false
            }
            Err(_) => {
                self.fail(&mut guard, "flush", "write timed out");
                false
            }
        }
    }

    fn errors(&self) -> Vec<String> {
        self.state.errors()
    }
}

/// Memcached ASCII protocol over any buffered stream.
pub(crate) mod proto {
    use std::io;
    use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    fn bad_response(line: &str) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected response: {line:?}"),
        )
    }

    async fn read_line<S>(stream: &mut S) -> io::Result<String>
    where
        S: AsyncBufRead + Unpin,
    {
        let mut line = String::new();
        let read = stream.read_line(&mut line).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            ));
        }
        Ok(line.trim_end().to_string())
    }

    /// `get <key>` → value bytes, or `None` on a miss.
    pub async fn get<S>(stream: &mut S, key: &str) -> io::Result<Option<Vec<u8>>>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
    {
        stream.write_all(format!("get {key}\r\n").as_bytes()).await?;
        stream.flush().await?;

        let header = read_line(stream).await?;
        if header == "END" {
            return Ok(None);
        }
        let mut parts = header.split_ascii_whitespace();
        if parts.next() != Some("VALUE") {
            return Err(bad_response(&header));
        }
        let len: usize = parts
            .nth(2)
            .and_then(|len| len.parse().ok())
            .ok_or_else(|| bad_response(&header))?;

        let mut data = vec![0u8; len + 2];
        stream.read_exact(&mut data).await?;
        data.truncate(len);

        let trailer = read_line(stream).await?;
        if trailer != "END" {
            return Err(bad_response(&trailer));
        }
        Ok(Some(data))
    }

    /// `set`/`replace <key> 0 <exptime> <len>` → whether the backend
    /// stored the value (`replace` answers `NOT_STORED` for a missing
    /// key).
    pub async fn store<S>(
        stream: &mut S,
        verb: &str,
        key: &str,
        value: &[u8],
        exptime: u64,
    ) -> io::Result<bool>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
    {
        stream
            .write_all(format!("{verb} {key} 0 {exptime} {}\r\n", value.len()).as_bytes())
            .await?;
        stream.write_all(value).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;

        let line = read_line(stream).await?;
        match line.as_str() {
            "STORED" => Ok(true),
            "NOT_STORED" => Ok(false),
            _ => Err(bad_response(&line)),
        }
    }

    /// `delete <key>` → whether the key existed.
    pub async fn delete<S>(stream: &mut S, key: &str) -> io::Result<bool>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
    {
        stream
            .write_all(format!("delete {key}\r\n").as_bytes())
            .await?;
        stream.flush().await?;

        let line = read_line(stream).await?;
        match line.as_str() {
            "DELETED" => Ok(true),
            "NOT_FOUND" => Ok(false),
            _ => Err(bad_response(&line)),
        }
    }

    /// `flush_all` → full-namespace invalidation.
    pub async fn flush_all<S>(stream: &mut S) -> io::Result<()>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
    {
        stream.write_all(b"flush_all\r\n").await?;
        stream.flush().await?;

        let line = read_line(stream).await?;
        if line == "OK" {
            return Ok(());
        }
        Err(bad_response(&line))
    }

    /// `version` → server version string.
    pub async fn version<S>(stream: &mut S) -> io::Result<String>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
    {
        stream.write_all(b"version\r\n").await?;
        stream.flush().await?;

        let line = read_line(stream).await?;
        match line.strip_prefix("VERSION ") {
            Some(version) => Ok(version.to_string()),
            None => Err(bad_response(&line)),
        }
    }
}
