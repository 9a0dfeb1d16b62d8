//! Cache error types.
//!
//! These only surface through the throwing construction path
//! (`connect`). Once an adapter exists, failures are absorbed into its
//! connection state instead of being returned.

use thiserror::Error;

/// Result type for store construction.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while building a remote store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend answered with something the client cannot interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The supplied settings cannot describe a usable backend.
    #[error("Configuration error: {0}")]
    Config(String),
}
