//! Visual media file classification
//!
//! Matching is a case-sensitive suffix test on the file name, so `clip.mp4`
//! and a bare `mp4` extension both qualify while `CLIP.MP4` does not.

use std::path::Path;

/// Suffixes of supported video files
const VIDEO_SUFFIXES: [&str; 3] = ["webm", "avi", "mp4"];

/// Suffixes of supported still images
const IMAGE_SUFFIXES: [&str; 3] = ["jpg", "jpeg", "png"];

/// Kind of visual media a file name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a file name or extension, `None` if it is not visual media.
    pub fn of(name: &str) -> Option<Self> {
        if VIDEO_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            Some(MediaKind::Video)
        } else if IMAGE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    /// Classify the final component of a path.
    pub fn of_path(path: &Path) -> Option<Self> {
        path.file_name()
            .map(|name| name.to_string_lossy())
            .and_then(|name| Self::of(&name))
    }
}

/// Does this file name or extension name a supported visual media file?
pub fn is_visual_media(name_or_extension: &str) -> bool {
    MediaKind::of(name_or_extension).is_some()
}

/// Same as [`is_visual_media`] applied to the last component of `path`.
pub fn is_visual_media_path(path: &Path) -> bool {
    MediaKind::of_path(path).is_some()
}
