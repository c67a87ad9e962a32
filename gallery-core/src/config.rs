//! Gallery configuration
//!
//! The library persists nothing; hosts embed [`GalleryConfig`] in their own
//! settings and hand it to the [`WatcherHub`](crate::WatcherHub).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which low-level notifications count as a completed write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteSignal {
    /// Only close-after-write notifications (inotify `IN_CLOSE_WRITE`)
    CloseWrite,
    /// Creates and data modifications too, for backends without close events
    AnyWrite,
}

impl Default for WriteSignal {
    fn default() -> Self {
        if cfg!(any(target_os = "linux", target_os = "android")) {
            WriteSignal::CloseWrite
        } else {
            WriteSignal::AnyWrite
        }
    }
}

/// Configuration shared by every watcher and controller of a hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Quiet period before a burst of watcher notifications triggers a refresh
    pub debounce_ms: u64,
    /// Buffered events per controller before slow subscribers start lagging
    pub event_capacity: usize,
    pub write_signal: WriteSignal,
    /// Read container headers for video durations during a scan
    pub probe_durations: bool,
}

impl GalleryConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            event_capacity: 64,
            write_signal: WriteSignal::default(),
            probe_durations: true,
        }
    }
}
