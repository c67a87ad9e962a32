//! Per-directory watcher registry owned by the host
//!
//! The hub is the composition-root object that guarantees one OS watch per
//! directory: every controller built through it for the same directory shares
//! the same [`DirectoryWatcher`].

use crate::config::GalleryConfig;
use crate::controller::GalleryController;
use crate::scan::{ContainerProbe, DurationProbe, NoProbe};
use crate::watcher::DirectoryWatcher;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct WatcherHub {
    config: GalleryConfig,
    probe: Arc<dyn DurationProbe>,
    watchers: DashMap<PathBuf, Arc<DirectoryWatcher>>,
}

impl WatcherHub {
    /// Create a hub probing durations according to `config.probe_durations`.
    pub fn new(config: GalleryConfig) -> Self {
        let probe: Arc<dyn DurationProbe> =
            if config.probe_durations { Arc::new(ContainerProbe) } else { Arc::new(NoProbe) };
        Self::with_probe(config, probe)
    }

    /// Create a hub with a custom duration source.
    pub fn with_probe(config: GalleryConfig, probe: Arc<dyn DurationProbe>) -> Self {
        Self {
            config,
            probe,
            watchers: DashMap::new(),
        }
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    /// The shared watcher for `directory`, constructed on first use.
    pub fn watcher_for(&self, directory: impl AsRef<Path>) -> Arc<DirectoryWatcher> {
        let key = normalize(directory.as_ref());
        self.watchers
            .entry(key.clone())
            .or_insert_with(|| {
                debug!("Creating shared watcher for {:?}", key);
                Arc::new(DirectoryWatcher::new(key.clone(), self.config.write_signal))
            })
            .value()
            .clone()
    }

    /// Build a controller for `directory` bound to the shared watcher.
    pub fn controller(&self, directory: impl AsRef<Path>) -> GalleryController {
        GalleryController::new(self.watcher_for(directory), self.probe.clone(), &self.config)
    }

    /// Forget the watcher for `directory` if no listener is left on it.
    ///
    /// Returns `true` if a watcher was released.
    pub fn release(&self, directory: impl AsRef<Path>) -> bool {
        let key = normalize(directory.as_ref());
        match self.watchers.remove_if(&key, |_, watcher| watcher.listener_count() == 0) {
            Some((_, watcher)) => {
                watcher.stop_watching();
                info!("Released watcher for {:?}", key);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

impl Default for WatcherHub {
    fn default() -> Self {
        Self::new(GalleryConfig::default())
    }
}

impl std::fmt::Debug for WatcherHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let directories: Vec<PathBuf> = self.watchers.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("WatcherHub")
            .field("config", &self.config)
            .field("directories", &directories)
            .finish()
    }
}

/// Resolve a directory to the key its watcher is stored under.
fn normalize(directory: &Path) -> PathBuf {
    std::fs::canonicalize(directory).unwrap_or_else(|_| directory.to_path_buf())
}
