use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::OutputFormat;
use crate::error::{EditorError, Result};

pub const DEFAULT_MIN_DIMENSION: f64 = 24.0;
pub const DEFAULT_MIN_TIMESPAN_MS: i64 = 100;
pub const DEFAULT_POINT_GRAB_SIZE: f64 = 20.0;
pub const DEFAULT_LINE_GRAB_SIZE: f64 = 10.0;
pub const DEFAULT_INPUT_FILENAME: &str = "input.mp4";

/// Tunables shared by the editing components.
///
/// Every field has a default, so a config file only needs to name the values
/// it overrides.
///
/// # Example
/// ```
/// use editor::EditorConfig;
///
/// let config = EditorConfig::from_json_str(r#"{ "min_dimension": 32 }"#)
///     .expect("config should parse");
/// assert_eq!(config.min_dimension, 32.0);
/// assert_eq!(config.min_timespan_ms, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    pub min_dimension: f64,
    pub min_timespan_ms: i64,
    pub point_grab_size: f64,
    pub line_grab_size: f64,
    pub default_format: OutputFormat,
    pub default_input_filename: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_dimension: DEFAULT_MIN_DIMENSION,
            min_timespan_ms: DEFAULT_MIN_TIMESPAN_MS,
            point_grab_size: DEFAULT_POINT_GRAB_SIZE,
            line_grab_size: DEFAULT_LINE_GRAB_SIZE,
            default_format: OutputFormat::Gif,
            default_input_filename: DEFAULT_INPUT_FILENAME.to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).map_err(EditorError::ConfigParse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| EditorError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_dimension.is_nan() || self.min_dimension < 1.0 {
            return Err(EditorError::invalid(
                "min_dimension",
                format!("must be at least 1, got {}", self.min_dimension),
            ));
        }
        if self.min_timespan_ms <= 0 {
            return Err(EditorError::invalid(
                "min_timespan_ms",
                format!("must be positive, got {}", self.min_timespan_ms),
            ));
        }
        if self.point_grab_size.is_nan() || self.point_grab_size <= 0.0 {
            return Err(EditorError::invalid(
                "point_grab_size",
                format!("must be positive, got {}", self.point_grab_size),
            ));
        }
        if self.line_grab_size.is_nan() || self.line_grab_size <= 0.0 {
            return Err(EditorError::invalid(
                "line_grab_size",
                format!("must be positive, got {}", self.line_grab_size),
            ));
        }
        if self.default_input_filename.trim().is_empty() {
            return Err(EditorError::invalid(
                "default_input_filename",
                "must not be empty",
            ));
        }
        Ok(())
    }
}
