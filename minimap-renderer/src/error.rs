use std::fmt;
use std::path::PathBuf;

/// Typed error for video encoding and muxing operations.
#[derive(Debug)]
pub enum VideoError {
    /// openh264 could not be initialized.
    EncoderInit(String),
    /// Frame encoding failed.
    EncodeFailed(String),
    /// MP4 muxing failed.
    MuxFailed(String),
    /// A frame arrived with an index other than the next expected one.
    OutOfOrder { expected: usize, got: usize },
    /// `finish` was called before any frame was pushed.
    NoFrames,
    /// I/O error (file creation, writes, etc.)
    Io(std::io::Error),
}

impl fmt::Display for VideoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncoderInit(msg) => write!(f, "encoder initialization failed: {msg}"),
            Self::EncodeFailed(msg) => write!(f, "encode failed: {msg}"),
            Self::MuxFailed(msg) => write!(f, "MP4 mux failed: {msg}"),
            Self::OutOfOrder { expected, got } => {
                write!(f, "frame {got} pushed while frame {expected} was expected")
            }
            Self::NoFrames => write!(f, "no frames were rendered"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for VideoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VideoError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Everything that can stop a replay from becoming a video.
#[derive(Debug)]
pub enum RenderError {
    /// The replay itself could not be decoded.
    Replay(wows_replay_core::Error),
    /// A required map, icon or font asset could not be loaded.
    MissingAsset { path: PathBuf, reason: String },
    Video(VideoError),
    /// The compositing thread pool could not be started.
    WorkerPool(String),
}

impl RenderError {
    pub(crate) fn missing(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MissingAsset {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replay(e) => write!(f, "could not decode replay: {e}"),
            Self::MissingAsset { path, reason } => {
                write!(f, "missing asset {}: {reason}", path.display())
            }
            Self::Video(e) => write!(f, "video output failed: {e}"),
            Self::WorkerPool(msg) => write!(f, "could not start render workers: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Replay(e) => Some(e),
            Self::Video(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wows_replay_core::Error> for RenderError {
    fn from(e: wows_replay_core::Error) -> Self {
        Self::Replay(e)
    }
}

impl From<VideoError> for RenderError {
    fn from(e: VideoError) -> Self {
        Self::Video(e)
    }
}
