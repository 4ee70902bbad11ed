/// Parses `HH:MM:SS(.ff)` into seconds.
///
/// # Example
/// ```
/// use media_ffmpeg::parse_timestamp;
///
/// assert_eq!(parse_timestamp("00:01:30.50"), Some(90.5));
/// ```
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let mut parts = raw.trim().split(':');
    let hours = parts.next()?.parse::<f64>().ok()?;
    let minutes = parts.next()?.parse::<f64>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() || hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn value_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest
        .find(|ch: char| ch == ',' || ch.is_whitespace())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Turns ffmpeg's stderr into fractional progress of the current command.
///
/// The total is the output length when the command limits it with `-t`,
/// otherwise the first `Duration:` line of the input. Later `time=` stats
/// lines are reported as a fraction of it. Fractions are not clamped.
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    duration_seconds: Option<f64>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser for a command whose output is known to be `seconds` long.
    pub fn with_output_seconds(seconds: f64) -> Self {
        Self {
            duration_seconds: Some(seconds).filter(|seconds| seconds.is_finite() && *seconds > 0.0),
        }
    }

    /// Parser for an ffmpeg argument list, honoring its `-t` limit.
    pub fn for_args(args: &[String]) -> Self {
        args.iter()
            .position(|arg| arg == "-t")
            .and_then(|index| args.get(index + 1))
            .and_then(|raw| raw.parse::<f64>().ok())
            .map_or_else(Self::new, Self::with_output_seconds)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    pub fn feed(&mut self, line: &str) -> Option<f64> {
        if self.duration_seconds.is_none() && line.trim_start().starts_with("Duration:") {
            self.duration_seconds = value_after(line, "Duration:")
                .and_then(parse_timestamp)
                .filter(|seconds| *seconds > 0.0);
            return None;
        }

        let elapsed = value_after(line, "time=").and_then(parse_timestamp)?;
        let total = self.duration_seconds?;
        Some(elapsed / total)
    }
}
