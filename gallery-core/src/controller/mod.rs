//! Gallery controller: owns one gallery state and keeps it in sync with disk
//!
//! Flow: OS event -> [`DirectoryWatcher`] -> listener pushes a signal into the
//! controller's channel -> [`Debouncer`] folds the burst -> rescan -> new
//! [`GalleryState`] published -> [`GalleryEvent::Refreshed`] broadcast.

use crate::config::GalleryConfig;
use crate::debouncer::{Debouncer, DebouncerConfig};
use crate::error::{GalleryError, Result};
use crate::scan::{DurationProbe, scan_directory};
use crate::state::GalleryState;
use crate::watcher::{DirectoryWatcher, Listener};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;


/// Lifecycle of a controller's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControllerPhase {
    /// Created, not started and never refreshed
    Idle,
    /// A scan is in flight
    Loading,
    Ready,
}

/// Notifications for the attached presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GalleryEvent {
    /// A new state was published
    Refreshed { generation: u64, entries: usize },
    /// A single item was deleted through [`GalleryController::remove`]
    Deleted { path: PathBuf },
    /// The directory was emptied through [`GalleryController::clear`]
    Cleared { removed: usize, failed: usize },
    /// The user picked an item
    Clicked { path: PathBuf },
}

/// Outcome of [`GalleryController::clear`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub removed: usize,
    /// Children that could not be deleted
    pub failed: Vec<PathBuf>,
}

/// State shared between the controller handle and its refresh task
struct Shared {
    directory: PathBuf,
    probe: Arc<dyn DurationProbe>,
    state: watch::Sender<GalleryState>,
    phase: watch::Sender<ControllerPhase>,
    events: broadcast::Sender<GalleryEvent>,
    /// Serializes rescans so states are published in generation order
    refresh_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    async fn refresh(&self) -> GalleryState {
        let _guard = self.refresh_lock.lock().await;
        self.phase.send_replace(ControllerPhase::Loading);

        let directory = self.directory.clone();
        let probe = self.probe.clone();
        let scanned =
            tokio::task::spawn_blocking(move || scan_directory(&directory, probe.as_ref()))
                .await;

        let entries = match scanned {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                warn!("{}", e);
                Vec::new()
            }
            Err(e) => {
                error!("Scan task for {:?} failed: {}", self.directory, e);
                Vec::new()
            }
        };

        let generation = self.state.borrow().generation() + 1;
        let state = GalleryState::new(entries, generation);
        self.state.send_replace(state.clone());
        self.phase.send_replace(ControllerPhase::Ready);

        debug!(
            "Published generation {} of {:?} ({} entries)",
            generation,
            self.directory,
            state.len()
        );
        let _ = self.events.send(GalleryEvent::Refreshed {
            generation,
            entries: state.len(),
        });
        state
    }

    /// Is `path` a direct child of the watched directory?
    fn owns(&self, path: &Path) -> bool {
        if path.parent() == Some(self.directory.as_path()) {
            return true;
        }
        match (
            std::fs::canonicalize(path),
            std::fs::canonicalize(&self.directory),
        ) {
            (Ok(path), Ok(directory)) => path.parent() == Some(directory.as_path()),
            _ => false,
        }
    }
}

/// Gallery bound to one UI surface
///
/// Controllers for the same directory share one [`DirectoryWatcher`], each
/// under its own UUID key. Dropping the controller (or calling
/// [`destroy`](GalleryController::destroy)) removes its registration and stops
/// its refresh task.
pub struct GalleryController {
    key: String,
    shared: Arc<Shared>,
    watcher: Arc<DirectoryWatcher>,
    debouncer: DebouncerConfig,
    signals: mpsc::UnboundedSender<()>,
    pending: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    remove_child: RemoveChild,
}

impl GalleryController {
    pub fn new(
        watcher: Arc<DirectoryWatcher>,
        probe: Arc<dyn DurationProbe>,
        config: &GalleryConfig,
    ) -> Self {
        let (signals, pending) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let shared = Arc::new(Shared {
            directory: watcher.directory().to_path_buf(),
            probe,
            state: watch::Sender::new(GalleryState::default()),
            phase: watch::Sender::new(ControllerPhase::Idle),
            events,
            refresh_lock: tokio::sync::Mutex::new(()),
        });

        Self {
            key: Uuid::new_v4().to_string(),
            shared,
            watcher,
            debouncer: DebouncerConfig {
                window: config.debounce(),
                ..Default::default()
            },
            signals,
            pending: Mutex::new(Some(pending)),
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
            remove_child,
        }
    }

    /// Scan once, then subscribe to the shared watcher and start watching.
    ///
    /// The subscription is only registered after the first state is
    /// published, so no event can race an empty gallery. If the OS watch
    /// cannot be established the scanned state stays available and
    /// [`GalleryError::WatchUnavailable`] is returned; live updates are off
    /// for this controller until the host builds a new one.
    ///
    /// Must run inside a tokio runtime. A second call is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Controller {} already started", self.key);
            return Ok(());
        }

        self.shared.phase.send_replace(ControllerPhase::Loading);
        self.shared.refresh().await;

        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rx) = pending {
            let debouncer = Debouncer::new(rx, self.debouncer.clone());
            let handle = tokio::spawn(run_refresh_loop(self.shared.clone(), debouncer));
            *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }

        let signals = self.signals.clone();
        let listener: Listener = Arc::new(move || {
            let _ = signals.send(());
        });
        self.watcher.add_listener(self.key.clone(), listener);

        match self.watcher.start_watching() {
            Ok(_) => {
                info!(
                    "Gallery controller {} started on {:?}",
                    self.key, self.shared.directory
                );
                Ok(())
            }
            Err(e) => {
                warn!("Live updates disabled for {:?}: {}", self.shared.directory, e);
                Err(e)
            }
        }
    }

    /// Rescan now and return the published state.
    pub async fn refresh(&self) -> GalleryState {
        self.shared.refresh().await
    }

    /// Queue a debounced rescan without waiting for it.
    ///
    /// Completion is observable through [`GalleryEvent::Refreshed`]. Requests
    /// made before [`start`](GalleryController::start) run once it is called.
    pub fn request_refresh(&self) {
        let _ = self.signals.send(());
    }

    /// Delete one item, rescan, then broadcast [`GalleryEvent::Deleted`].
    ///
    /// A path that does not exist, lies outside the watched directory or
    /// cannot be deleted leaves the state alone and broadcasts nothing.
    /// Returns `true` if the file was deleted.
    pub async fn remove(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            debug!("Nothing to remove at {:?}", path);
            return false;
        }
        if !self.shared.owns(path) {
            warn!(
                "Refusing to remove {:?}: not inside {:?}",
                path, self.shared.directory
            );
            return false;
        }

        if let Err(source) = tokio::fs::remove_file(path).await {
            let e = GalleryError::DeleteFailed {
                path: path.to_path_buf(),
                source,
            };
            warn!("{}", e);
            return false;
        }

        self.shared.refresh().await;
        let _ = self.shared.events.send(GalleryEvent::Deleted {
            path: path.to_path_buf(),
        });
        true
    }

    /// Delete every direct child of the directory, rescan, then broadcast
    /// [`GalleryEvent::Cleared`].
    ///
    /// Best effort: a child that cannot be deleted is logged and reported,
    /// and the remaining children are still deleted.
    pub async fn clear(&self) -> ClearReport {
        let directory = self.shared.directory.clone();
        let remove_child = self.remove_child;
        let report = tokio::task::spawn_blocking(move || clear_directory(&directory, remove_child))
            .await
            .unwrap_or_else(|e| {
                error!("Clear task for {:?} failed: {}", self.shared.directory, e);
                ClearReport::default()
            });

        self.shared.refresh().await;
        let _ = self.shared.events.send(GalleryEvent::Cleared {
            removed: report.removed,
            failed: report.failed.len(),
        });
        report
    }

    /// Forward a click on an item to every subscriber.
    pub fn click(&self, path: impl Into<PathBuf>) {
        let _ = self.shared.events.send(GalleryEvent::Clicked { path: path.into() });
    }

    /// Subscribe to gallery events. Each receiver gets every event sent after
    /// it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<GalleryEvent> {
        self.shared.events.subscribe()
    }

    /// Current state snapshot
    pub fn state(&self) -> GalleryState {
        self.shared.state.borrow().clone()
    }

    /// Receiver that observes every published state
    pub fn watch_state(&self) -> watch::Receiver<GalleryState> {
        self.shared.state.subscribe()
    }

    pub fn phase(&self) -> ControllerPhase {
        *self.shared.phase.borrow()
    }

    /// Key of this controller's registration on the shared watcher
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn directory(&self) -> &Path {
        &self.shared.directory
    }

    pub fn watcher(&self) -> &Arc<DirectoryWatcher> {
        &self.watcher
    }

    /// Tear the controller down. Equivalent to dropping it.
    pub fn destroy(self) {
        info!("Destroying gallery controller {}", self.key);
    }
}

impl Drop for GalleryController {
    fn drop(&mut self) {
        self.watcher.remove_listener(&self.key);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.abort();
        }
        debug!(
            "Controller {} unregistered from {:?}",
            self.key, self.shared.directory
        );
    }
}

impl std::fmt::Debug for GalleryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryController")
            .field("key", &self.key)
            .field("directory", &self.shared.directory)
            .field("phase", &self.phase())
            .field("entries", &self.shared.state.borrow().len())
            .finish()
    }
}

async fn run_refresh_loop(shared: Arc<Shared>, mut debouncer: Debouncer<()>) {
    while let Some(batch) = debouncer.next_batch().await {
        debug!(
            "Refreshing {:?} after {} change signals",
            shared.directory,
            batch.len()
        );
        shared.refresh().await;
    }
}

/// Deletes one child of a cleared directory; the flag says it is a directory
type RemoveChild = fn(&Path, bool) -> io::Result<()>;

fn remove_child(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

fn clear_directory(directory: &Path, remove_child: RemoveChild) -> ClearReport {
    let mut report = ClearReport::default();

    let read_dir = match std::fs::read_dir(directory) {
        Ok(read_dir) => read_dir,
        Err(e) => {
            warn!("Cannot list {:?} for clearing: {}", directory, e);
            return report;
        }
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        // Symlinks report their own type, so a link to a directory is unlinked, not followed
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        match remove_child(&path, is_dir) {
            Ok(()) => report.removed += 1,
            Err(source) => {
                let e = GalleryError::DeleteFailed {
                    path: path.clone(),
                    source,
                };
                warn!("{}", e);
                report.failed.push(path);
            }
        }
    }

    info!(
        "Cleared {:?}: {} removed, {} failed",
        directory,
        report.removed,
        report.failed.len()
    );
    report
}
