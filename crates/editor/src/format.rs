use crate::error::{EditorError, Result};

const HOUR_MS: i64 = 60 * 60 * 1000;
const MINUTE_MS: i64 = 60 * 1000;
const SECOND_MS: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Components {
    hours: i64,
    minutes: i64,
    seconds: i64,
    millis: i64,
}

fn split_ms(time_ms: i64) -> Components {
    let mut remaining = time_ms.max(0);
    let hours = remaining / HOUR_MS;
    remaining -= hours * HOUR_MS;
    let minutes = remaining / MINUTE_MS;
    remaining -= minutes * MINUTE_MS;
    let seconds = remaining / SECOND_MS;
    remaining -= seconds * SECOND_MS;
    Components {
        hours,
        minutes,
        seconds,
        millis: remaining,
    }
}

/// Formats milliseconds as `HH:MM:SS.mmm`.
///
/// # Example
/// ```
/// use editor::format::format_duration;
///
/// assert_eq!(format_duration(3_723_004), "01:02:03.004");
/// ```
pub fn format_duration(time_ms: i64) -> String {
    let c = split_ms(time_ms);
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        c.hours, c.minutes, c.seconds, c.millis
    )
}

/// Formats milliseconds for file names, e.g. `1h2m3s4ms` or `5s0ms`.
pub fn format_compact(time_ms: i64) -> String {
    let c = split_ms(time_ms);
    let mut out = String::new();
    if c.hours > 0 {
        out.push_str(&format!("{}h", c.hours));
    }
    if c.minutes > 0 {
        out.push_str(&format!("{}m", c.minutes));
    }
    if c.seconds > 0 {
        out.push_str(&format!("{}s", c.seconds));
    }
    out.push_str(&format!("{}ms", c.millis));
    out
}

/// Parses `HH:MM:SS.mmm`, `MM:SS.mmm` or plain seconds into milliseconds.
pub fn parse_time_ms(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() > 3 || parts.iter().any(|part| part.is_empty()) {
        return Err(EditorError::invalid("time", format!("unrecognized time `{raw}`")));
    }

    let mut total_seconds = 0.0;
    for (index, part) in parts.iter().enumerate() {
        let is_last = index + 1 == parts.len();
        let value = if is_last {
            part.parse::<f64>().ok()
        } else {
            part.parse::<u32>().ok().map(f64::from)
        };
        let Some(value) = value.filter(|value| value.is_finite() && *value >= 0.0) else {
            return Err(EditorError::invalid("time", format!("unrecognized time `{raw}`")));
        };
        total_seconds = total_seconds * 60.0 + value;
    }

    Ok((total_seconds * 1000.0).round() as i64)
}
