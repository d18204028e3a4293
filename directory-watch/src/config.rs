//! Configuration for a directory watch.

use serde::{Deserialize, Serialize};

/// Options applied to a [`DirectoryWatch`](crate::DirectoryWatch) at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Emit lifecycle and per-event debug logs.
    pub debug: bool,
}

impl WatchOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
