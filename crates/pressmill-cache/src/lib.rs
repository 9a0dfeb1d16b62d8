//! Tiered metadata cache for the Pressmill update server.
//!
//! The cache is composed of two tiers behind a single [`Cache`] contract:
//!
//! - **Shadow tier**: a process-scoped map that mirrors every value read or
//!   written during the process lifetime, so repeated lookups for the same
//!   key never re-hit the network.
//! - **Remote tier**: a network-attached key/value store ([`RedisStore`],
//!   [`MemcachedStore`]) or the local filesystem ([`FileStore`]) behind the
//!   uniform [`RemoteStore`] contract.
//!
//! # Failure semantics
//!
//! A cache is an optimization, not a source of truth. The facade never
//! returns an error across its public `get`/`set`/`clear` boundary: the
//! first backend failure flips the adapter into a permanent disconnected
//! state and every subsequent operation degrades to a miss or a no-op. The
//! accumulated failure record is available through [`TieredCache::info`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod shadow;
pub mod state;
pub mod store;
pub mod tiered;
pub mod r#trait;

pub use codec::{looks_serialized, ValueCodec};
pub use config::{CacheSettings, FileSettings, MemcachedSettings, RedisScheme, RedisSettings};
pub use error::{StoreError, StoreResult};
pub use key::KeyDeriver;
pub use r#trait::Cache;
pub use state::ConnectionState;
pub use store::{FileStore, MemcachedStore, RedisStore, RemoteStore};
pub use tiered::{CacheInfo, TieredCache};
