//! Output settings: file names, scale and format.
//!
//! Every change rebuilds the [`CommandOptions`] snapshot, which is what the
//! command generator consumes.

use tracing::debug;

use crate::command::{CommandOptions, OutputFormat};
use crate::config::EditorConfig;
use crate::format::format_compact;
use crate::geometry::{Rect, Size, TimeRange, round_half_up};
use crate::observable::{ObservableProperty, ReadOnlyProperty};

/// Splits `name` at its last dot; names without one have an empty extension.
pub fn split_off_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) => (&name[..index], &name[index + 1..]),
        None => (name, ""),
    }
}

fn join_extension(base: &str, extension: &str) -> String {
    if extension.is_empty() {
        base.to_string()
    } else {
        format!("{base}.{extension}")
    }
}

fn round_to_even(value: f64) -> f64 {
    round_half_up(value / 2.0) * 2.0
}

/// Editable base name that follows its default until the user changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameField {
    default_base: String,
    base: String,
    extension: String,
}

impl NameField {
    fn new(default_name: &str) -> Self {
        let (base, extension) = split_off_extension(default_name);
        Self {
            default_base: base.to_string(),
            base: base.to_string(),
            extension: extension.to_string(),
        }
    }

    fn follow_default(&mut self, default_name: &str) {
        let (base, extension) = split_off_extension(default_name);
        if self.base == self.default_base || self.base.is_empty() {
            self.base = base.to_string();
        }
        self.default_base = base.to_string();
        self.extension = extension.to_string();
    }

    fn reset(&mut self) {
        self.base = self.default_base.clone();
    }

    fn filename(&self) -> String {
        join_extension(&self.base, &self.extension)
    }
}

pub struct OptionsEditor {
    default_input_filename: String,
    input: NameField,
    output: NameField,
    format: OutputFormat,
    crop: Option<Rect>,
    time_range: Option<TimeRange>,
    scale_ratio: f64,
    command_options: ObservableProperty<CommandOptions>,
}

impl OptionsEditor {
    pub fn new(config: &EditorConfig) -> Self {
        let format = config.default_format;
        let input = NameField::new(&config.default_input_filename);
        let output = NameField::new(&join_extension(&input.base, format.extension()));
        let mut editor = Self {
            default_input_filename: config.default_input_filename.clone(),
            command_options: ObservableProperty::new(CommandOptions {
                input_filename: input.filename(),
                output_filename: output.filename(),
                format,
                crop: None,
                scale: None,
                time_range: None,
            })
            .log_with("OptionsEditor.command_options"),
            input,
            output,
            format,
            crop: None,
            time_range: None,
            scale_ratio: 1.0,
        };
        editor.refresh();
        editor
    }

    pub fn command_options(&self) -> ReadOnlyProperty<CommandOptions> {
        self.command_options.as_read_only()
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn input_filename(&self) -> String {
        self.input.filename()
    }

    pub fn output_filename(&self) -> String {
        self.output.filename()
    }

    pub fn scale_ratio(&self) -> f64 {
        self.scale_ratio
    }

    /// Scale ratio as a percentage rounded to one decimal.
    pub fn scale_percent(&self) -> f64 {
        round_half_up(self.scale_ratio * 1000.0) / 10.0
    }

    /// Output frame size: the crop scaled by the ratio, rounded to even.
    pub fn scale_size(&self) -> Option<Size> {
        self.crop.map(|crop| {
            Size::new(
                round_to_even(crop.width() * self.scale_ratio),
                round_to_even(crop.height() * self.scale_ratio),
            )
        })
    }

    /// `"<percent>% (<w>x<h>)"`.
    pub fn scale_summary(&self) -> String {
        let size = self.scale_size().unwrap_or_default();
        format!(
            "{}% ({}x{})",
            self.scale_percent(),
            size.width,
            size.height
        )
    }

    // Inputs from the model.

    /// Follows the loaded file; `None` restores the configured placeholder.
    pub fn set_source_filename(&mut self, filename: Option<&str>) {
        let name = filename.unwrap_or(&self.default_input_filename).to_string();
        self.input.follow_default(&name);
        self.refresh();
    }

    pub fn set_crop(&mut self, crop: Option<Rect>) {
        self.crop = crop;
        self.refresh();
    }

    pub fn set_time_range(&mut self, time_range: Option<TimeRange>) {
        self.time_range = time_range;
        self.refresh();
    }

    // User edits.

    pub fn set_scale_percent(&mut self, percent: f64) {
        if !percent.is_finite() || percent <= 0.0 {
            return;
        }
        self.scale_ratio = percent / 100.0;
        self.refresh();
    }

    /// Scales so the output width is `width` (rounded to even).
    pub fn set_scale_width(&mut self, width: f64) {
        let Some(crop) = self.crop.filter(|crop| crop.width() > 0.0) else {
            return;
        };
        let width = round_to_even(width);
        if !width.is_finite() || width <= 0.0 {
            return;
        }
        self.scale_ratio = width / crop.width();
        self.refresh();
    }

    pub fn set_scale_height(&mut self, height: f64) {
        let Some(crop) = self.crop.filter(|crop| crop.height() > 0.0) else {
            return;
        };
        let height = round_to_even(height);
        if !height.is_finite() || height <= 0.0 {
            return;
        }
        self.scale_ratio = height / crop.height();
        self.refresh();
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
        self.refresh();
    }

    /// Selects a format by name; unknown names are ignored.
    pub fn set_format_name(&mut self, name: &str) {
        match name.parse::<OutputFormat>() {
            Ok(format) => self.set_format(format),
            Err(error) => debug!(%error, "format selection ignored"),
        }
    }

    pub fn set_input_base_name(&mut self, base: &str) {
        self.input.base = base.to_string();
        self.refresh();
    }

    pub fn set_output_base_name(&mut self, base: &str) {
        self.output.base = base.to_string();
        self.refresh();
    }

    pub fn reset_input_name(&mut self) {
        self.input.reset();
        self.refresh();
    }

    pub fn reset_output_name(&mut self) {
        self.output.reset();
        self.refresh();
    }

    /// Name derived from the input, crop, scale, trim and format.
    pub fn default_output_filename(&self) -> String {
        let mut name = self.input.base.clone();
        if let Some(crop) = self.crop {
            name.push_str(&format!(
                "--crop-x{}y{}-{}x{}",
                crop.x(),
                crop.y(),
                crop.width(),
                crop.height()
            ));
        }
        if let Some(scale) = self.scale_size() {
            name.push_str(&format!("--scale-{}x{}", scale.width, scale.height));
        }
        if let Some(range) = self.time_range {
            name.push_str(&format!(
                "--time-{}-{}",
                format_compact(range.start_ms),
                format_compact(range.end_ms)
            ));
        }
        join_extension(&name, self.format.extension())
    }

    fn refresh(&mut self) {
        let default_output = self.default_output_filename();
        self.output.follow_default(&default_output);
        self.command_options.set(CommandOptions {
            input_filename: self.input.filename(),
            output_filename: self.output.filename(),
            format: self.format,
            crop: self.crop,
            scale: self.scale_size(),
            time_range: self.time_range,
        });
    }
}
