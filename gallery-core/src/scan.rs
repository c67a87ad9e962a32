//! Directory scanning and duration probing

use crate::error::{GalleryError, Result};
use crate::filter::MediaKind;
use crate::state::{MediaDuration, MediaEntry, sort_newest_first};
use chrono::{DateTime, Utc};
use media_probe::ProbeError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, error, trace, warn};

/// Source of running times for gallery entries
pub trait DurationProbe: Send + Sync {
    /// Probe one file. Failures are recovered by the caller as
    /// [`MediaDuration::Unavailable`].
    fn probe(&self, path: &Path, kind: MediaKind) -> Result<MediaDuration>;
}

/// Reads container headers through `media_probe`
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerProbe;

impl DurationProbe for ContainerProbe {
    fn probe(&self, path: &Path, kind: MediaKind) -> Result<MediaDuration> {
        if kind == MediaKind::Image {
            return Ok(MediaDuration::NotApplicable);
        }

        match media_probe::probe_duration(path) {
            Ok(duration) => Ok(MediaDuration::Known(duration)),
            Err(ProbeError::NotTimed(_)) => Ok(MediaDuration::NotApplicable),
            Err(e) => Err(GalleryError::MetadataUnavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Skips probing; every video is reported as unavailable
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbe;

impl DurationProbe for NoProbe {
    fn probe(&self, _path: &Path, kind: MediaKind) -> Result<MediaDuration> {
        Ok(match kind {
            MediaKind::Image => MediaDuration::NotApplicable,
            MediaKind::Video => MediaDuration::Unavailable,
        })
    }
}

/// List the visual media directly inside `directory`, newest first.
///
/// Entries that vanish or cannot be inspected mid-scan are skipped. Only a
/// failure to list the directory itself is an error.
pub fn scan_directory(directory: &Path, probe: &dyn DurationProbe) -> Result<Vec<MediaEntry>> {
    let read_dir = std::fs::read_dir(directory).map_err(|source| GalleryError::Scan {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();

    for dir_entry in read_dir {
        let dir_entry = match dir_entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry in {:?}: {}", directory, e);
                continue;
            }
        };
        let path = dir_entry.path();

        let name = dir_entry.file_name();
        let name = name.to_string_lossy();
        let Some(kind) = MediaKind::of(&name) else {
            trace!("Ignoring non-media file: {:?}", path);
            continue;
        };

        // Follows symlinks, so a link to a media file is listed like the file
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                debug!("Skipping {:?}: {}", path, e);
                continue;
            }
        };

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let duration = probe_isolated(probe, &path, kind);

        entries.push(MediaEntry::new(
            path,
            duration,
            DateTime::<Utc>::from(modified),
        ));
    }

    sort_newest_first(&mut entries);
    debug!("Scanned {:?}: {} media entries", directory, entries.len());
    Ok(entries)
}

/// Probe one entry; an error or a panic in the probe only costs that entry
/// its duration.
fn probe_isolated(probe: &dyn DurationProbe, path: &Path, kind: MediaKind) -> MediaDuration {
    match catch_unwind(AssertUnwindSafe(|| probe.probe(path, kind))) {
        Ok(Ok(duration)) => duration,
        Ok(Err(e)) => {
            warn!("{}", e);
            MediaDuration::Unavailable
        }
        Err(_) => {
            error!("Duration probe panicked on {:?}", path);
            MediaDuration::Unavailable
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Write a file and pin its modification time to `secs` after the epoch.
    pub(crate) fn write_with_mtime(dir: &Path, name: &str, secs: u64) {
        let path = dir.join(name);
        fs::write(&path, b"media").unwrap();
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs))
            .unwrap();
    }

    fn names(entries: &[MediaEntry]) -> Vec<&str> {
        entries.iter().filter_map(MediaEntry::file_name).collect()
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        write_with_mtime(temp_dir.path(), "a.mp4", 10);
        write_with_mtime(temp_dir.path(), "b.jpg", 20);
        write_with_mtime(temp_dir.path(), "notes.txt", 30);
        write_with_mtime(temp_dir.path(), "song.mp3", 40);
        fs::create_dir(temp_dir.path().join("nested.png")).unwrap();

        let entries = scan_directory(temp_dir.path(), &NoProbe).unwrap();
        assert_eq!(names(&entries), vec!["b.jpg", "a.mp4"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let result = scan_directory(&missing, &NoProbe);
        assert!(matches!(result, Err(GalleryError::Scan { .. })));
    }

    #[test]
    fn test_unreadable_video_duration_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        write_with_mtime(temp_dir.path(), "broken.mp4", 1);
        write_with_mtime(temp_dir.path(), "still.png", 2);

        let entries = scan_directory(temp_dir.path(), &ContainerProbe).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].duration(), MediaDuration::NotApplicable);
        assert_eq!(entries[1].duration(), MediaDuration::Unavailable);
        assert_eq!(entries[1].duration_millis(), -1);
    }

    struct FixedProbe(Duration);

    impl DurationProbe for FixedProbe {
        fn probe(&self, _path: &Path, _kind: MediaKind) -> Result<MediaDuration> {
            Ok(MediaDuration::Known(self.0))
        }
    }

    #[test]
    fn test_custom_probe() {
        let temp_dir = TempDir::new().unwrap();
        write_with_mtime(temp_dir.path(), "clip.webm", 1);

        let entries =
            scan_directory(temp_dir.path(), &FixedProbe(Duration::from_secs(7))).unwrap();
        assert_eq!(entries[0].duration_label().as_deref(), Some("00:07"));
    }

    struct PanicOnVideo;

    impl DurationProbe for PanicOnVideo {
        fn probe(&self, path: &Path, kind: MediaKind) -> Result<MediaDuration> {
            match kind {
                MediaKind::Image => Ok(MediaDuration::NotApplicable),
                MediaKind::Video => panic!("unreadable header in {path:?}"),
            }
        }
    }

    #[test]
    fn test_panicking_probe_only_loses_that_duration() {
        let temp_dir = TempDir::new().unwrap();
        write_with_mtime(temp_dir.path(), "keep.jpg", 1);
        write_with_mtime(temp_dir.path(), "bad.mp4", 2);

        let entries = scan_directory(temp_dir.path(), &PanicOnVideo).unwrap();
        assert_eq!(names(&entries), vec!["bad.mp4", "keep.jpg"]);
        assert_eq!(entries[0].duration(), MediaDuration::Unavailable);
        assert_eq!(entries[1].duration(), MediaDuration::NotApplicable);
    }

    #[test]
    fn test_oversized_mp4_box_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        write_with_mtime(temp_dir.path(), "keep.jpg", 1);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&16u32.to_be_bytes());
        bytes.extend_from_slice(b"ftypisom");
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(b"moov");
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());
        fs::write(temp_dir.path().join("bad.mp4"), bytes).unwrap();

        let entries = scan_directory(temp_dir.path(), &ContainerProbe).unwrap();
        assert_eq!(entries.len(), 2);
        let bad = entries
            .iter()
            .find(|entry| entry.file_name() == Some("bad.mp4"))
            .unwrap();
        assert_eq!(bad.duration(), MediaDuration::Unavailable);
    }
}
