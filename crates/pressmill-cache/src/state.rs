//! Connection state tracking for remote store adapters.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// One-way connection state machine: Connected → Disconnected.
///
/// An adapter instance starts connected and flips to disconnected on the
/// first caught backend failure. There is no transition back: a new state
/// requires a new adapter instance. The state owns the append-only
/// diagnostics record exposed through `errors()`.
pub struct ConnectionState {
    connected: AtomicBool,
    errors: Mutex<Vec<String>>,
    descriptor: String,
}

impl ConnectionState {
    /// A fresh, connected state with a client/version descriptor.
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            connected: AtomicBool::new(true),
            errors: Mutex::new(Vec::new()),
            descriptor: descriptor.into(),
        }
    }

    /// A state born disconnected, for the lenient construction path.
    pub fn failed(descriptor: impl Into<String>, context: &str, err: impl fmt::Display) -> Self {
        let state = Self::new(descriptor);
        state.record_failure(context, err);
        state
    }

    /// Whether the remote path is still usable.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Record a backend failure and permanently disable the remote path
    /// for this instance.
    pub fn record_failure(&self, context: &str, err: impl fmt::Display) {
        warn!(op = context, error = %err, "cache backend failure, disabling remote tier");
        self.errors.lock().push(format!("{context}: {err}"));
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Record a failure without flipping the state. Used by backends whose
    /// errors are not symptoms of a dead peer (local filesystem).
    pub fn record_soft_failure(&self, context: &str, err: impl fmt::Display) {
        warn!(op = context, error = %err, "cache backend failure");
        self.errors.lock().push(format!("{context}: {err}"));
    }

    /// Snapshot of the accumulated error record.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Client/version descriptor for diagnostics.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("connected", &self.is_connected())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
