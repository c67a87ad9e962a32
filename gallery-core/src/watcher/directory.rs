//! Shared directory watcher built on the notify crate

use crate::config::WriteSignal;
use crate::error::{GalleryError, Result};
use crate::filter::is_visual_media_path;
use crate::watcher::registry::{Listener, ListenerRegistry};
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, trace, warn};

/// Classification of a low-level filesystem event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A file was closed after writing
    WriteClosed,
    Deleted,
    /// Opens, reads, metadata changes, moves
    Ignored,
}

impl ChangeKind {
    /// Map a notify event kind onto the kinds the gallery reacts to.
    pub fn classify(kind: &EventKind, signal: WriteSignal) -> Self {
        match kind {
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeKind::WriteClosed,
            EventKind::Remove(_) => ChangeKind::Deleted,
            EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
                if signal == WriteSignal::AnyWrite =>
            {
                ChangeKind::WriteClosed
            }
            _ => ChangeKind::Ignored,
        }
    }

    pub fn is_qualifying(&self) -> bool {
        !matches!(self, ChangeKind::Ignored)
    }
}

/// Watches one directory and fans qualifying changes out to its listeners
///
/// Construction is inert; nothing is watched until [`start_watching`] runs.
/// Listeners are invoked synchronously on the thread that delivers the OS
/// event, which is never an async runtime thread. Listeners should only hand
/// the signal over to their own execution context.
///
/// [`start_watching`]: DirectoryWatcher::start_watching
pub struct DirectoryWatcher {
    directory: PathBuf,
    write_signal: WriteSignal,
    registry: ListenerRegistry,
    subscription: Mutex<Option<RecommendedWatcher>>,
    activations: AtomicUsize,
}

impl DirectoryWatcher {
    pub fn new(directory: impl Into<PathBuf>, write_signal: WriteSignal) -> Self {
        Self {
            directory: directory.into(),
            write_signal,
            registry: ListenerRegistry::new(),
            subscription: Mutex::new(None),
            activations: AtomicUsize::new(0),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Activate the OS subscription.
    ///
    /// Returns `Ok(false)` without doing anything if it is already active.
    /// Fails with [`GalleryError::WatchUnavailable`] if the directory is
    /// missing or cannot be watched; there is no retry.
    pub fn start_watching(self: &Arc<Self>) -> Result<bool> {
        let mut subscription = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if subscription.is_some() {
            debug!("Already watching {:?}", self.directory);
            return Ok(false);
        }

        // Weak so the OS watcher stored inside `self` does not keep `self` alive
        let this = Arc::downgrade(self);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Some(this) = this.upgrade() else {
                return;
            };
            match res {
                Ok(event) => this.handle_event(&event),
                Err(e) => warn!("Watch error on {:?}: {}", this.directory, e),
            }
        })
        .map_err(|source| self.unavailable(source))?;

        watcher
            .watch(&self.directory, RecursiveMode::NonRecursive)
            .map_err(|source| self.unavailable(source))?;

        *subscription = Some(watcher);
        self.activations.fetch_add(1, Ordering::SeqCst);
        info!("Watching directory: {:?}", self.directory);
        Ok(true)
    }

    /// Drop the OS subscription. Listeners stay registered.
    pub fn stop_watching(&self) {
        let previous = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        if previous.is_some() {
            info!("Stopped watching directory: {:?}", self.directory);
        }
    }

    pub fn is_watching(&self) -> bool {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Number of times an OS subscription was actually established
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// See [`ListenerRegistry::add_listener`]: the first registration for a key wins.
    pub fn add_listener(&self, key: impl Into<String>, listener: Listener) -> bool {
        self.registry.add_listener(key, listener)
    }

    pub fn remove_listener(&self, key: &str) -> bool {
        self.registry.remove_listener(key)
    }

    pub fn has_listener(&self, key: &str) -> bool {
        self.registry.contains(key)
    }

    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    /// Feed one low-level event through the filter.
    ///
    /// Only write completion and deletion of visual media reach the listeners.
    /// Returns the number of listeners notified.
    pub fn on_low_level_event(&self, kind: ChangeKind, path: &Path) -> usize {
        if !kind.is_qualifying() {
            return 0;
        }
        if !is_visual_media_path(path) {
            trace!("Ignoring {:?} on non-media path {:?}", kind, path);
            return 0;
        }

        debug!("{:?} {:?}, notifying {} listeners", kind, path, self.registry.len());
        self.registry.notify_all()
    }

    fn handle_event(&self, event: &Event) {
        let kind = ChangeKind::classify(&event.kind, self.write_signal);
        for path in &event.paths {
            self.on_low_level_event(kind, path);
        }
    }

    fn unavailable(&self, source: notify::Error) -> GalleryError {
        GalleryError::WatchUnavailable {
            path: self.directory.clone(),
            source,
        }
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("directory", &self.directory)
            .field("write_signal", &self.write_signal)
            .field("listeners", &self.registry)
            .field("watching", &self.is_watching())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, MetadataKind, RemoveKind, RenameMode};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn counting_listener() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        let listener: Listener = Arc::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn test_classify_close_write_only() {
        let close_write = EventKind::Access(AccessKind::Close(AccessMode::Write));
        let data = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        let create = EventKind::Create(CreateKind::File);
        let rename = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        let chmod = EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions));
        let open = EventKind::Access(AccessKind::Open(AccessMode::Any));

        let signal = WriteSignal::CloseWrite;
        assert_eq!(ChangeKind::classify(&close_write, signal), ChangeKind::WriteClosed);
        assert_eq!(
            ChangeKind::classify(&EventKind::Remove(RemoveKind::File), signal),
            ChangeKind::Deleted
        );
        assert_eq!(ChangeKind::classify(&data, signal), ChangeKind::Ignored);
        assert_eq!(ChangeKind::classify(&create, signal), ChangeKind::Ignored);
        assert_eq!(ChangeKind::classify(&rename, signal), ChangeKind::Ignored);
        assert_eq!(ChangeKind::classify(&chmod, signal), ChangeKind::Ignored);
        assert_eq!(ChangeKind::classify(&open, signal), ChangeKind::Ignored);
    }

    #[test]
    fn test_classify_any_write() {
        let signal = WriteSignal::AnyWrite;
        let data = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        let rename = EventKind::Modify(ModifyKind::Name(RenameMode::Both));

        assert_eq!(ChangeKind::classify(&data, signal), ChangeKind::WriteClosed);
        assert_eq!(
            ChangeKind::classify(&EventKind::Create(CreateKind::File), signal),
            ChangeKind::WriteClosed
        );
        assert_eq!(ChangeKind::classify(&rename, signal), ChangeKind::Ignored);
    }

    #[test]
    fn test_low_level_event_filtering() {
        let watcher = DirectoryWatcher::new("/gallery", WriteSignal::CloseWrite);
        let (count, listener) = counting_listener();
        watcher.add_listener("controller", listener);

        assert_eq!(watcher.on_low_level_event(ChangeKind::WriteClosed, Path::new("a.mp4")), 1);
        assert_eq!(watcher.on_low_level_event(ChangeKind::Deleted, Path::new("b.jpg")), 1);
        assert_eq!(watcher.on_low_level_event(ChangeKind::WriteClosed, Path::new("c.txt")), 0);
        assert_eq!(watcher.on_low_level_event(ChangeKind::Ignored, Path::new("d.png")), 0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_start_watching_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = Arc::new(DirectoryWatcher::new(
            temp_dir.path().join("missing"),
            WriteSignal::default(),
        ));

        let result = watcher.start_watching();
        assert!(matches!(result, Err(GalleryError::WatchUnavailable { .. })));
        assert!(!watcher.is_watching());
        assert_eq!(watcher.activations(), 0);
    }

    #[test]
    fn test_start_watching_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = Arc::new(DirectoryWatcher::new(temp_dir.path(), WriteSignal::default()));

        assert!(watcher.start_watching().unwrap());
        assert!(!watcher.start_watching().unwrap());
        assert_eq!(watcher.activations(), 1);

        watcher.stop_watching();
        assert!(!watcher.is_watching());
    }

    #[tokio::test]
    async fn test_file_write_reaches_listener() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = Arc::new(DirectoryWatcher::new(temp_dir.path(), WriteSignal::default()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        watcher.add_listener(
            "test",
            Arc::new(move || {
                let _ = tx.send(());
            }),
        );
        watcher.start_watching().unwrap();

        std::fs::write(temp_dir.path().join("notes.txt"), b"ignored").unwrap();
        std::fs::write(temp_dir.path().join("capture.png"), b"png").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(received, Ok(Some(()))));
    }
}
