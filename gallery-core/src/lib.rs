//! Directory-backed media gallery
//!
//! This crate keeps an observable, newest-first list of the photos and videos
//! in a directory. A shared [`DirectoryWatcher`] per directory turns OS change
//! notifications into listener calls, each [`GalleryController`] debounces them
//! into rescans and publishes whole [`GalleryState`] snapshots, and a
//! presentation layer renders those snapshots and reacts to [`GalleryEvent`]s.

pub mod config;
pub mod controller;
pub mod debouncer;
pub mod error;
pub mod filter;
pub mod format;
pub mod hub;
pub mod scan;
pub mod state;
pub mod watcher;

pub use config::{GalleryConfig, WriteSignal};
pub use controller::{ClearReport, ControllerPhase, GalleryController, GalleryEvent};
pub use debouncer::{Debouncer, DebouncerConfig};
pub use error::{GalleryError, Result};
pub use filter::{MediaKind, is_visual_media, is_visual_media_path};
pub use hub::WatcherHub;
pub use scan::{ContainerProbe, DurationProbe, NoProbe, scan_directory};
pub use state::{GalleryState, MediaDuration, MediaEntry};
pub use watcher::{ChangeKind, DirectoryWatcher, Listener, ListenerRegistry};
