use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{MediaFfmpegError, Result};

/// Frame size and length of a file's first video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub duration_seconds: Option<f64>,
}

impl VideoInfo {
    /// Duration in whole milliseconds, `0` when unknown.
    pub fn duration_ms(&self) -> i64 {
        self.duration_seconds
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .map_or(0, |seconds| (seconds * 1000.0).floor() as i64)
    }
}

/// Probes the first video stream of a file via `ffprobe`.
///
/// # Example
/// ```no_run
/// use media_ffmpeg::probe_video;
///
/// let info = probe_video("sample.mp4").expect("probe should succeed");
/// assert!(info.width > 0);
/// ```
pub fn probe_video(path: impl AsRef<Path>) -> Result<VideoInfo> {
    let path = path.as_ref();

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .output()
        .map_err(|source| MediaFfmpegError::Process {
            tool: "ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::ToolFailed {
            tool: "ffprobe",
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let info = parse_probe_output(path, &stdout)?;
    debug!(
        path = %path.display(),
        width = info.width,
        height = info.height,
        duration_seconds = ?info.duration_seconds,
        "probed video"
    );
    Ok(info)
}

/// Parses `key=value` lines printed by `ffprobe -of default=noprint_wrappers=1`.
pub(crate) fn parse_probe_output(path: &Path, stdout: &str) -> Result<VideoInfo> {
    let fields: HashMap<&str, &str> = stdout
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();

    if !fields.contains_key("width") && !fields.contains_key("height") {
        return Err(MediaFfmpegError::NoVideoStream(path.to_path_buf()));
    }

    let width = parse_dimension(fields.get("width").copied(), "width")?;
    let height = parse_dimension(fields.get("height").copied(), "height")?;
    let (Some(width), Some(height)) = (width, height) else {
        return Err(MediaFfmpegError::NoVideoStream(path.to_path_buf()));
    };

    let duration_seconds = match fields.get("duration").copied() {
        None | Some("") | Some("N/A") => None,
        Some(raw) => Some(raw.parse::<f64>().map_err(|_| MediaFfmpegError::ProbeField {
            field: "duration",
            value: raw.to_string(),
        })?),
    };

    Ok(VideoInfo {
        path: path.to_path_buf(),
        width,
        height,
        duration_seconds,
    })
}

fn parse_dimension(value: Option<&str>, field: &'static str) -> Result<Option<u32>> {
    match value {
        None | Some("") | Some("N/A") | Some("0") => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| MediaFfmpegError::ProbeField {
                field,
                value: raw.to_string(),
            }),
    }
}
