use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;
use tracing::{debug, trace};

use crate::error::{MediaFfmpegError, Result};
use crate::progress::ProgressParser;

const STDERR_TAIL_LINES: usize = 20;

/// Output observed while ffmpeg runs.
#[derive(Debug, Clone, PartialEq)]
pub enum FfmpegOutput {
    /// One stderr line, without its terminator.
    Log(String),
    /// Fraction of the expected output written so far; may exceed 1.
    Progress(f64),
}

/// Scratch directory of named files that ffmpeg runs inside.
///
/// File names are plain names relative to the directory, matching the names
/// used in command argument lists. The directory is removed on drop.
#[derive(Debug)]
pub struct TranscodeWorkspace {
    dir: TempDir,
}

impl TranscodeWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("clipcrop-")
            .tempdir()
            .map_err(|source| MediaFfmpegError::Workspace {
                action: "create",
                name: String::new(),
                source,
            })?;
        debug!(path = %dir.path().display(), "transcode workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.path().join(name)),
            _ => Err(MediaFfmpegError::InvalidFileName(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok_and(|path| path.is_file())
    }

    pub fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(name)?;
        std::fs::write(&path, data).map_err(|source| MediaFfmpegError::Workspace {
            action: "write",
            name: name.to_string(),
            source,
        })?;
        trace!(name, bytes = data.len(), "workspace file written");
        Ok(())
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        std::fs::read(&path).map_err(|source| MediaFfmpegError::Workspace {
            action: "read",
            name: name.to_string(),
            source,
        })
    }

    pub fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        std::fs::remove_file(&path).map_err(|source| MediaFfmpegError::Workspace {
            action: "delete",
            name: name.to_string(),
            source,
        })?;
        trace!(name, "workspace file deleted");
        Ok(())
    }

    /// Runs `ffmpeg <args>` inside the workspace, streaming stderr lines and
    /// progress to `on_output` until the process exits.
    pub fn run_ffmpeg(&self, args: &[String], on_output: &mut dyn FnMut(FfmpegOutput)) -> Result<()> {
        debug!(args = ?args, "running ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-nostdin", "-y"])
            .args(args)
            .current_dir(self.dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| MediaFfmpegError::Process {
                tool: "ffmpeg",
                source,
            })?;

        let mut tail: Vec<String> = Vec::new();
        if let Some(stderr) = child.stderr.take() {
            let mut parser = ProgressParser::for_args(args);
            read_lines(stderr, |line| {
                if let Some(fraction) = parser.feed(&line) {
                    on_output(FfmpegOutput::Progress(fraction));
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line.clone());
                on_output(FfmpegOutput::Log(line));
            })
            .map_err(|source| MediaFfmpegError::Process {
                tool: "ffmpeg",
                source,
            })?;
        }

        let status = child.wait().map_err(|source| MediaFfmpegError::Process {
            tool: "ffmpeg",
            source,
        })?;
        if !status.success() {
            debug!(args = ?args, %status, "ffmpeg failed");
            return Err(MediaFfmpegError::ToolFailed {
                tool: "ffmpeg",
                status,
                stderr: tail.join("\n"),
            });
        }
        Ok(())
    }
}

/// Splits a byte stream on `\r` as well as `\n`; ffmpeg rewrites its stats
/// line with carriage returns.
fn read_lines(source: impl Read, mut on_line: impl FnMut(String)) -> std::io::Result<()> {
    let mut current = Vec::new();
    for byte in BufReader::new(source).bytes() {
        match byte? {
            b'\r' | b'\n' => {
                if !current.is_empty() {
                    on_line(String::from_utf8_lossy(&current).into_owned());
                    current.clear();
                }
            }
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        on_line(String::from_utf8_lossy(&current).into_owned());
    }
    Ok(())
}
