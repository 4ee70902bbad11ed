use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the editor crate.
pub type Result<T> = std::result::Result<T, EditorError>;

/// Errors produced by editor operations and pipeline runs.
#[derive(Debug)]
pub enum EditorError {
    NoVideoLoaded,
    InvalidArgument {
        context: &'static str,
        reason: String,
    },
    Media(MediaError),
    Pipeline {
        step: String,
        reason: String,
    },
    PipelineBusy,
    MissingRunInput {
        what: &'static str,
    },
    Clipboard(String),
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigParse(serde_json::Error),
    Backend(media_ffmpeg::MediaFfmpegError),
}

impl EditorError {
    pub(crate) fn invalid(context: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            context,
            reason: reason.into(),
        }
    }
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoVideoLoaded => write!(f, "no video is loaded"),
            Self::InvalidArgument { context, reason } => {
                write!(f, "invalid {context}: {reason}")
            }
            Self::Media(err) => write!(f, "{err}"),
            Self::Pipeline { step, reason } => write!(f, "{step} failed: {reason}"),
            Self::PipelineBusy => write!(f, "a pipeline run is already in progress"),
            Self::MissingRunInput { what } => write!(f, "run is missing {what}"),
            Self::Clipboard(reason) => write!(f, "failed to copy to clipboard: {reason}"),
            Self::ConfigIo { path, source } => {
                write!(f, "read editor config {}: {source}", path.display())
            }
            Self::ConfigParse(err) => write!(f, "editor config is malformed: {err}"),
            Self::Backend(err) => write!(f, "media backend error: {err}"),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigIo { source, .. } => Some(source),
            Self::ConfigParse(err) => Some(err),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<media_ffmpeg::MediaFfmpegError> for EditorError {
    fn from(value: media_ffmpeg::MediaFfmpegError) -> Self {
        Self::Backend(value)
    }
}

impl From<MediaError> for EditorError {
    fn from(value: MediaError) -> Self {
        Self::Media(value)
    }
}

/// Load/decode failure reported by the media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaError {
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
    Unknown,
}

impl MediaError {
    /// Maps a standard media error code (1..=4) to its kind.
    pub fn from_code(code: Option<u16>) -> Self {
        match code {
            Some(1) => Self::Aborted,
            Some(2) => Self::Network,
            Some(3) => Self::Decode,
            Some(4) => Self::SourceNotSupported,
            _ => Self::Unknown,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Aborted => "Loading was aborted.",
            Self::Network => "Network error occurred.",
            Self::Decode => "Unable to decode file.",
            Self::SourceNotSupported => "Media source not supported.",
            Self::Unknown => "Unknown error loading file.",
        }
    }
}

impl Display for MediaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for MediaError {}
