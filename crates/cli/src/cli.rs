use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use editor::OutputFormat;
use editor::format::parse_time_ms;
use editor::geometry::Rect;

#[derive(Parser, Debug)]
#[command(name = "clipcrop", version, about = "Crop, trim and scale video clips into GIF or MP4")]
pub struct Cli {
    /// Editor settings as JSON (minimum crop size, default format, ...)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print size and duration of a video
    Probe(ProbeArgs),
    /// Print the ffmpeg pipeline for an edit without running it
    Plan(PlanArgs),
    /// Run the pipeline and write the result
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Print JSON instead of a summary line
    #[arg(long)]
    pub json: bool,
}

/// Edit requests shared by `plan` and `run`.
#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Crop in video pixels as W:H:X:Y
    #[arg(long, value_name = "W:H:X:Y", value_parser = parse_crop)]
    pub crop: Option<Rect>,

    /// Trim start as HH:MM:SS.mmm, MM:SS.mmm or seconds
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    pub start: Option<i64>,

    /// Trim end as HH:MM:SS.mmm, MM:SS.mmm or seconds
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    pub end: Option<i64>,

    /// Output scale as a percentage (50 or 50%) or WxH; W or H may be left out
    #[arg(long, value_name = "SCALE", value_parser = parse_scale)]
    pub scale: Option<Scale>,

    /// Output format: gif or mp4
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file name; the extension follows the format
    #[arg(short, long, value_name = "NAME")]
    pub output: Option<String>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub edit: EditArgs,

    /// Print options and commands as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub edit: EditArgs,

    /// Directory the result is written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    Percent(f64),
    Width(f64),
    Height(f64),
    Size { width: f64, height: f64 },
}

fn parse_dimension(raw: &str, what: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .ok_or_else(|| format!("{what} must be a non-negative number, got `{raw}`"))
}

pub fn parse_crop(raw: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [width, height, x, y] = parts.as_slice() else {
        return Err(format!("crop must be W:H:X:Y, got `{raw}`"));
    };
    let rect = Rect::from_xywh(
        parse_dimension(x, "crop x")?,
        parse_dimension(y, "crop y")?,
        parse_dimension(width, "crop width")?,
        parse_dimension(height, "crop height")?,
    );
    if rect.size.is_empty() {
        return Err(format!("crop must have a non-zero size, got `{raw}`"));
    }
    Ok(rect)
}

pub fn parse_scale(raw: &str) -> Result<Scale, String> {
    let raw = raw.trim();
    if let Some((width, height)) = raw.split_once(['x', 'X']) {
        return match (width.is_empty(), height.is_empty()) {
            (false, false) => Ok(Scale::Size {
                width: parse_dimension(width, "scale width")?,
                height: parse_dimension(height, "scale height")?,
            }),
            (false, true) => Ok(Scale::Width(parse_dimension(width, "scale width")?)),
            (true, false) => Ok(Scale::Height(parse_dimension(height, "scale height")?)),
            (true, true) => Err(format!("scale needs a width or a height, got `{raw}`")),
        };
    }
    let percent = raw.strip_suffix('%').unwrap_or(raw);
    parse_dimension(percent, "scale percentage").map(Scale::Percent)
}

fn parse_time(raw: &str) -> Result<i64, String> {
    parse_time_ms(raw).map_err(|err| err.to_string())
}
