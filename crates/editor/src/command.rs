//! Compiles an options snapshot into an ordered list of external commands.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EditorError, Result};
use crate::geometry::{Rect, Size, TimeRange};

/// Two-pass palette filter used for GIF output.
pub const GIF_PALETTE_FILTER: &str = "split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse";

/// Program name a [`FileCommand`] uses to delete a transcoder file.
pub const REMOVE_PROGRAM: &str = "rm";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Gif,
    Mp4,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Mp4 => "mp4",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Gif => "GIF",
            Self::Mp4 => "MP4",
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputFormat {
    type Err = EditorError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gif" => Ok(Self::Gif),
            "mp4" => Ok(Self::Mp4),
            other => Err(EditorError::invalid(
                "output format",
                format!("expected gif or mp4, got `{other}`"),
            )),
        }
    }
}

/// Everything needed to generate commands for one edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOptions {
    pub input_filename: String,
    pub output_filename: String,
    pub format: OutputFormat,
    /// Crop in native video pixels.
    pub crop: Option<Rect>,
    /// Output size of the cropped frame.
    pub scale: Option<Size>,
    pub time_range: Option<TimeRange>,
}

/// One transcode invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FfmpegCommand {
    pub input_filename: String,
    pub output_filename: String,
    pub trim: Option<TimeRange>,
    pub filter_graph: Option<String>,
    pub extra_args: Vec<String>,
}

impl FfmpegCommand {
    /// Argument list in execution order, without the program name.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-i".to_string(), self.input_filename.clone()];
        if let Some(trim) = self.trim {
            args.push("-ss".to_string());
            args.push(ms_to_seconds_arg(trim.start_ms));
            args.push("-t".to_string());
            args.push(ms_to_seconds_arg(trim.duration_ms()));
        }
        if let Some(filter_graph) = self.filter_graph.as_ref().filter(|graph| !graph.is_empty()) {
            args.push("-vf".to_string());
            args.push(filter_graph.clone());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(self.output_filename.clone());
        args
    }
}

/// Filesystem utility invocation, e.g. deleting an intermediate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Ffmpeg(FfmpegCommand),
    File(FileCommand),
}

impl Command {
    pub fn program(&self) -> &str {
        match self {
            Self::Ffmpeg(_) => "ffmpeg",
            Self::File(command) => &command.program,
        }
    }

    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Ffmpeg(command) => command.args(),
            Self::File(command) => command.args.clone(),
        }
    }

    /// Shell rendering with every argument double-quoted.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program().to_string()];
        parts.extend(self.args().iter().map(|arg| quote(arg)));
        parts.join(" ")
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Builds the command pipeline for `options`.
///
/// MP4 output is a single trim/crop/scale pass. GIF output renders an
/// audio-less intermediate MP4, converts it with a palette pass, then deletes
/// the intermediate.
///
/// # Example
/// ```
/// use editor::command::{CommandOptions, OutputFormat, build_commands};
///
/// let commands = build_commands(&CommandOptions {
///     input_filename: "in.mp4".to_string(),
///     output_filename: "out.gif".to_string(),
///     format: OutputFormat::Gif,
///     crop: None,
///     scale: None,
///     time_range: None,
/// });
/// assert_eq!(commands.len(), 3);
/// ```
pub fn build_commands(options: &CommandOptions) -> Vec<Command> {
    let commands = match options.format {
        OutputFormat::Gif => build_gif_commands(options),
        OutputFormat::Mp4 => vec![Command::Ffmpeg(trim_crop_scale_command(options, None))],
    };
    debug!(
        format = %options.format,
        output = %options.output_filename,
        commands = commands.len(),
        "command pipeline generated"
    );
    commands
}

/// Text a user copies: every command line joined with ` && `.
pub fn pipeline_text(commands: &[Command]) -> String {
    commands
        .iter()
        .map(Command::command_line)
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Intermediate file name used by the GIF pipeline.
pub fn intermediate_filename(output_filename: &str) -> String {
    format!("tmp-{output_filename}.mp4")
}

fn build_gif_commands(options: &CommandOptions) -> Vec<Command> {
    let intermediate = intermediate_filename(&options.output_filename);

    let mut prepare = trim_crop_scale_command(options, Some(intermediate.clone()));
    prepare.extra_args = vec!["-an".to_string()];

    let convert = FfmpegCommand {
        input_filename: intermediate.clone(),
        output_filename: options.output_filename.clone(),
        trim: None,
        filter_graph: Some(GIF_PALETTE_FILTER.to_string()),
        extra_args: vec!["-loop".to_string(), "0".to_string()],
    };

    let cleanup = FileCommand {
        program: REMOVE_PROGRAM.to_string(),
        args: vec![intermediate],
    };

    vec![
        Command::Ffmpeg(prepare),
        Command::Ffmpeg(convert),
        Command::File(cleanup),
    ]
}

fn trim_crop_scale_command(options: &CommandOptions, output_override: Option<String>) -> FfmpegCommand {
    FfmpegCommand {
        input_filename: options.input_filename.clone(),
        output_filename: output_override.unwrap_or_else(|| options.output_filename.clone()),
        trim: options.time_range,
        filter_graph: filter_graph(options.crop, options.scale),
        extra_args: Vec::new(),
    }
}

fn filter_graph(crop: Option<Rect>, scale: Option<Size>) -> Option<String> {
    let filters: Vec<String> = [crop.map(crop_filter), scale.map(scale_filter)]
        .into_iter()
        .flatten()
        .collect();
    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

fn crop_filter(crop: Rect) -> String {
    format!(
        "crop={}:{}:{}:{}",
        crop.width(),
        crop.height(),
        crop.x(),
        crop.y()
    )
}

fn scale_filter(scale: Size) -> String {
    format!("scale={}x{}:flags=lanczos", scale.width, scale.height)
}

fn ms_to_seconds_arg(ms: i64) -> String {
    (ms as f64 / 1000.0).to_string()
}

fn quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for ch in arg.chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Destination for copied command text.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// Copies the pipeline text; failures are logged and reported as `false`.
pub fn copy_commands<C: Clipboard + ?Sized>(clipboard: &mut C, commands: &[Command]) -> bool {
    match clipboard.write_text(&pipeline_text(commands)) {
        Ok(()) => true,
        Err(error) => {
            warn!(%error, "copy to clipboard failed");
            false
        }
    }
}
