//! Error types for gallery operations
//!
//! Almost every failure here is absorbed into gallery state (an empty list, an
//! unavailable duration, a skipped delete) and only logged. The one error a host
//! sees is [`GalleryError::WatchUnavailable`] from `start`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gallery operations
#[derive(Debug, Error)]
pub enum GalleryError {
    /// The OS-level directory watch could not be established
    #[error("Cannot watch {path:?}: {source}")]
    WatchUnavailable {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Duration extraction failed for a media file
    #[error("Metadata unavailable for {path:?}: {reason}")]
    MetadataUnavailable { path: PathBuf, reason: String },

    /// A file or directory could not be deleted
    #[error("Failed to delete {path:?}: {source}")]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The watched directory could not be listed
    #[error("Failed to scan {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for gallery operations
pub type Result<T> = std::result::Result<T, GalleryError>;
