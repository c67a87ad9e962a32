//! Gallery state: immutable entries published as a whole

use crate::filter::MediaKind;
use crate::format::{format_age, format_elapsed_time};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Running time of a gallery entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i64")]
pub enum MediaDuration {
    Known(Duration),
    /// Still images have no running time
    NotApplicable,
    /// Probing failed or the container is not understood
    Unavailable,
}

impl MediaDuration {
    /// Millisecond view with `-1` standing for "no duration".
    pub fn as_millis_or_sentinel(&self) -> i64 {
        match self {
            MediaDuration::Known(duration) => {
                i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
            }
            MediaDuration::NotApplicable | MediaDuration::Unavailable => -1,
        }
    }

    pub fn known(&self) -> Option<Duration> {
        match self {
            MediaDuration::Known(duration) => Some(*duration),
            _ => None,
        }
    }
}

impl From<MediaDuration> for i64 {
    fn from(duration: MediaDuration) -> Self {
        duration.as_millis_or_sentinel()
    }
}

/// One photo or video in the gallery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaEntry {
    path: PathBuf,
    #[serde(rename = "duration_millis")]
    duration: MediaDuration,
    last_modified: DateTime<Utc>,
}

impl MediaEntry {
    pub fn new(path: PathBuf, duration: MediaDuration, last_modified: DateTime<Utc>) -> Self {
        Self {
            path,
            duration,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::of_path(&self.path)
    }

    pub fn duration(&self) -> MediaDuration {
        self.duration
    }

    /// Duration in milliseconds, `-1` when there is none
    pub fn duration_millis(&self) -> i64 {
        self.duration.as_millis_or_sentinel()
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Running time as `MM:SS` / `H:MM:SS`, if known
    pub fn duration_label(&self) -> Option<String> {
        self.duration.known().map(|d| format_elapsed_time(d.as_secs()))
    }

    /// How long ago the file was written, relative to `now`
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        let elapsed = (now - self.last_modified).to_std().unwrap_or_default();
        format_age(elapsed)
    }
}

/// Sort entries newest first. The sort is stable, so ties keep scan order.
pub fn sort_newest_first(entries: &mut [MediaEntry]) {
    entries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
}

/// Snapshot of a gallery, newest entry first
///
/// Cloning is cheap; the entry list is shared and never modified. A refresh
/// builds a new state with the next generation number.
#[derive(Debug, Clone)]
pub struct GalleryState {
    entries: Arc<[MediaEntry]>,
    generation: u64,
}

impl GalleryState {
    pub fn new(entries: Vec<MediaEntry>, generation: u64) -> Self {
        Self {
            entries: entries.into(),
            generation,
        }
    }

    pub fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaEntry> {
        self.entries.iter()
    }

    /// Number of completed refreshes that produced this state, `0` before the first scan
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&MediaEntry> {
        self.entries.first()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|entry| entry.path == path)
    }

    /// File names in display order
    pub fn file_names(&self) -> Vec<&str> {
        self.entries.iter().filter_map(MediaEntry::file_name).collect()
    }
}

impl Default for GalleryState {
    fn default() -> Self {
        Self::new(Vec::new(), 0)
    }
}
