//! Container duration probing for gallery entries
//! Extracted to a separate crate so the gallery core stays free of FFmpeg
//!
//! Only the container is opened; no frame is decoded. The running time comes
//! from the best video stream, falling back to the container duration.

use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Errors produced while probing a media file
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is a still image and has no running time
    #[error("'{0}' has no running time")]
    NotTimed(String),

    #[error("Container '{0}' is not supported")]
    Unsupported(String),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("No usable duration: {0}")]
    NoDuration(String),
}

pub type Result<T> = std::result::Result<T, ProbeError>;

/// Container families the prober accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// ISO base media file format (mp4, mov, m4v)
    IsoBmff,
    /// RIFF/AVI
    Avi,
    /// Matroska and its WebM profile
    Matroska,
}

impl Container {
    /// Resolve a container from a file extension.
    ///
    /// Still image extensions resolve to [`ProbeError::NotTimed`], everything
    /// else that is not understood to [`ProbeError::Unsupported`].
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mp4" | "m4v" | "mov" => Ok(Container::IsoBmff),
            "avi" => Ok(Container::Avi),
            "webm" | "mkv" => Ok(Container::Matroska),
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" => {
                Err(ProbeError::NotTimed(extension.to_string()))
            }
            other => Err(ProbeError::Unsupported(other.to_string())),
        }
    }
}

static FFMPEG_INIT: Once = Once::new();

/// Initialize FFmpeg once per process, with its own logging kept to errors.
fn init_ffmpeg() -> Result<()> {
    let mut init_result = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            init_result = Err(ProbeError::Ffmpeg(e));
            return;
        }

        // SAFETY: av_log_set_level only stores the global log level
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR);
        }
    });

    init_result
}

/// Probe the running time of the file at `path`.
pub fn probe_duration(path: &Path) -> Result<Duration> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let container = Container::from_extension(extension)?;

    // Surface a missing or unreadable file as I/O rather than an FFmpeg code
    std::fs::metadata(path)?;

    init_ffmpeg()?;
    let ictx = ffmpeg_next::format::input(&path)?;

    let stream_secs = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .filter(|stream| stream.duration() > 0)
        .map(|stream| {
            let time_base = stream.time_base();
            stream.duration() as f64 * f64::from(time_base.numerator())
                / f64::from(time_base.denominator())
        });

    let secs = match stream_secs {
        Some(secs) => secs,
        None if ictx.duration() > 0 => {
            ictx.duration() as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
        }
        None => {
            return Err(ProbeError::NoDuration(format!(
                "{} reports no duration",
                path.display()
            )));
        }
    };

    let duration = Duration::try_from_secs_f64(secs)
        .map_err(|e| ProbeError::NoDuration(format!("{}: {e}", path.display())))?;
    trace!("Probed {:?} ({:?}): {:?}", path, container, duration);
    Ok(duration)
}
