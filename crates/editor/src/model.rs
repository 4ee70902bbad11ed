use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EditorConfig;
use crate::error::Result;
use crate::geometry::{Point, Rect, Size, TimeRange, constrain, constrain_ms};
use crate::observable::{ObservableProperty, ReadOnlyProperty};

/// Snapshot of a freshly loaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProperties {
    pub filename: Option<String>,
    pub size: Size,
    pub duration_ms: i64,
}

impl VideoProperties {
    pub fn new(filename: impl Into<String>, size: Size, duration_ms: i64) -> Self {
        Self {
            filename: Some(filename.into()),
            size,
            duration_ms,
        }
    }

    /// Reads size and duration of a file on disk through ffprobe.
    pub fn probe(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let info = media_ffmpeg::probe_video(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(Self {
            filename,
            size: Size::new(f64::from(info.width), f64::from(info.height)),
            duration_ms: info.duration_ms(),
        })
    }
}

/// Single writable source of truth for the crop rectangle and trim range.
///
/// `crop` is in native video pixels and stays inside the frame with both
/// dimensions at least `min_dimension`. `trim` stays inside `[0, duration]`
/// and spans at least `min_timespan_ms` whenever the video is long enough.
pub struct VideoModel {
    min_dimension: f64,
    min_timespan_ms: i64,
    filename: ObservableProperty<Option<String>>,
    size: ObservableProperty<Size>,
    duration_ms: ObservableProperty<i64>,
    crop: ObservableProperty<Rect>,
    trim: ObservableProperty<TimeRange>,
}

impl VideoModel {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            min_dimension: config.min_dimension,
            min_timespan_ms: config.min_timespan_ms,
            filename: ObservableProperty::new(None),
            size: ObservableProperty::new(Size::default()),
            duration_ms: ObservableProperty::new(0),
            crop: ObservableProperty::new(Rect::default()).log_with("VideoModel.crop"),
            trim: ObservableProperty::new(TimeRange::default()).log_with("VideoModel.trim"),
        }
    }

    pub fn filename(&self) -> ReadOnlyProperty<Option<String>> {
        self.filename.as_read_only()
    }

    pub fn size(&self) -> ReadOnlyProperty<Size> {
        self.size.as_read_only()
    }

    pub fn duration_ms(&self) -> ReadOnlyProperty<i64> {
        self.duration_ms.as_read_only()
    }

    pub fn crop(&self) -> ReadOnlyProperty<Rect> {
        self.crop.as_read_only()
    }

    pub fn trim(&self) -> ReadOnlyProperty<TimeRange> {
        self.trim.as_read_only()
    }

    /// Replaces the loaded video; crop becomes the full frame and trim the
    /// full duration.
    pub fn set_properties(&self, properties: VideoProperties) {
        debug!(
            filename = ?properties.filename,
            width = properties.size.width,
            height = properties.size.height,
            duration_ms = properties.duration_ms,
            "video properties loaded"
        );
        self.filename.set(properties.filename);
        self.size.set(properties.size);
        self.duration_ms.set(properties.duration_ms);
        self.crop.set(Rect::new(Point::default(), properties.size));
        self.trim.set(TimeRange::new(0, properties.duration_ms));
    }

    /// Moves the trim start, pushing the end later when the span would drop
    /// under the minimum.
    pub fn set_start_time_ms(&self, start_ms: i64) {
        let duration = self.duration_ms.get();
        let mut end_ms = self.trim.get().end_ms;
        let mut start_ms = constrain_ms(start_ms, 0, duration);

        if end_ms - start_ms < self.min_timespan_ms {
            end_ms = constrain_ms(start_ms + self.min_timespan_ms, 0, duration);
            start_ms = constrain_ms(end_ms - self.min_timespan_ms, 0, duration);
        }

        self.trim.set(TimeRange::new(start_ms, end_ms));
    }

    /// Moves the trim end, pulling the start earlier when the span would drop
    /// under the minimum.
    pub fn set_end_time_ms(&self, end_ms: i64) {
        let duration = self.duration_ms.get();
        let mut start_ms = self.trim.get().start_ms;
        let mut end_ms = constrain_ms(end_ms, 0, duration);

        if end_ms - start_ms < self.min_timespan_ms {
            start_ms = constrain_ms(end_ms - self.min_timespan_ms, 0, duration);
            end_ms = constrain_ms(start_ms + self.min_timespan_ms, 0, duration);
        }

        self.trim.set(TimeRange::new(start_ms, end_ms));
    }

    /// Moves the whole trim window, keeping its duration.
    pub fn set_span_start_ms(&self, start_ms: i64) {
        let duration = self.duration_ms.get();
        let span = self.trim.get().duration_ms();
        let start_ms = constrain_ms(start_ms, 0, duration - span);
        self.trim.set(TimeRange::new(start_ms, start_ms + span));
    }

    pub fn is_modified(&self) -> bool {
        if self.filename.get().is_none() {
            return false;
        }
        let crop = self.crop.get();
        if crop.position != Point::default() || crop.size != self.size.get() {
            return true;
        }
        self.trim.get() != TimeRange::new(0, self.duration_ms.get())
    }

    /// Applies a ratio-space crop from an editor.
    ///
    /// Resizes clamp position first and then shrink the size to fit. With
    /// `preserve_size` the rect is pushed back inside the frame instead, so a
    /// moved crop keeps its dimensions.
    pub fn update_crop(&self, ratio_crop: Rect, preserve_size: bool) {
        let values = [
            ratio_crop.x(),
            ratio_crop.y(),
            ratio_crop.width(),
            ratio_crop.height(),
        ];
        if values.iter().any(|value| !value.is_finite()) {
            warn!(crop = ?ratio_crop, "ignoring non-finite crop update");
            return;
        }

        let min = self.min_dimension;
        let video = self.size.get();
        let raw = ratio_crop.to_pixel_rect(video);

        let position = Point::new(
            constrain(raw.x(), 0.0, video.width - min),
            constrain(raw.y(), 0.0, video.height - min),
        );
        let shift = position - raw.position;
        let mut limited = Rect::new(
            position,
            Size::new(
                constrain(raw.width() - shift.x, min, video.width - position.x),
                constrain(raw.height() - shift.y, min, video.height - position.y),
            ),
        );

        if preserve_size {
            let wanted = Size::new(
                constrain(raw.width(), min, video.width),
                constrain(raw.height(), min, video.height),
            );
            let diff = wanted - limited.size;

            if diff.width != 0.0 {
                limited.position.x =
                    constrain(limited.x() - diff.width, 0.0, video.width - min);
                limited.size.width = constrain(wanted.width, min, video.width - limited.x());
            }
            if diff.height != 0.0 {
                limited.position.y =
                    constrain(limited.y() - diff.height, 0.0, video.height - min);
                limited.size.height = constrain(wanted.height, min, video.height - limited.y());
            }
        }

        self.crop.set(limited);
    }

    /// Resets to the empty, no-video state.
    pub fn clear(&self) {
        self.filename.set(None);
        self.size.set(Size::default());
        self.duration_ms.set(0);
        self.crop.set(Rect::default());
        self.trim.set(TimeRange::default());
    }
}
