use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

pub type Result<T> = std::result::Result<T, MediaFfmpegError>;

/// Failures of `ffprobe`/`ffmpeg` runs and of the scratch directory they use.
#[derive(Debug)]
pub enum MediaFfmpegError {
    /// `ffprobe` found no video stream with a usable frame size.
    NoVideoStream(PathBuf),
    /// A probe field that is present but not a number.
    ProbeField { field: &'static str, value: String },
    /// Workspace names must be a single plain path component.
    InvalidFileName(String),
    Workspace {
        action: &'static str,
        name: String,
        source: io::Error,
    },
    /// The tool could not be started, or talking to it failed.
    Process {
        tool: &'static str,
        source: io::Error,
    },
    /// The tool ran and exited unsuccessfully; `stderr` holds its last lines.
    ToolFailed {
        tool: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}

impl Display for MediaFfmpegError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoVideoStream(path) => write!(f, "{} has no video stream", path.display()),
            Self::ProbeField { field, value } => {
                write!(f, "ffprobe reported a bad {field}: {value:?}")
            }
            Self::InvalidFileName(name) => {
                write!(f, "workspace file name must be a plain file name: {name:?}")
            }
            Self::Workspace {
                action,
                name,
                source,
            } => write!(f, "{action} workspace file {name:?}: {source}"),
            Self::Process { tool, source } => write!(f, "{tool}: {source}"),
            Self::ToolFailed {
                tool,
                status,
                stderr,
            } => {
                write!(f, "{tool} exited with {status}")?;
                match stderr.trim().lines().last() {
                    Some(last) => write!(f, ": {last}"),
                    None => Ok(()),
                }
            }
        }
    }
}

impl std::error::Error for MediaFfmpegError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Workspace { source, .. } | Self::Process { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::MediaFfmpegError;

    #[test]
    fn workspace_error_names_the_file_and_keeps_the_source() {
        let error = MediaFfmpegError::Workspace {
            action: "read",
            name: "out.gif".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(error.to_string(), "read workspace file \"out.gif\": gone");
        assert!(std::error::Error::source(&error).is_some());
    }
}
