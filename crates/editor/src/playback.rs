//! Playback state over a host media element.
//!
//! The host forwards the element's events (`on_*` methods) and display-frame
//! callbacks; the adapter keeps an interpolated current time between the
//! element's coarse time updates and keeps playback inside the loop range.
//! Only this adapter seeks or replaces the element's source.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::MediaError;
use crate::geometry::{Size, TimeRange, constrain_ms};
use crate::observable::{ObservableEmitter, ObservableProperty, ReadOnlyEmitter, ReadOnlyProperty};

/// Which loop boundary the preview should park on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PreviewSelect {
    #[default]
    None,
    Start,
    End,
    Toggle,
}

/// The black-box video element the adapter drives.
pub trait MediaElement {
    fn set_source(&mut self, url: &str);
    fn duration_seconds(&self) -> f64;
    fn video_size(&self) -> Size;
    fn current_time_seconds(&self) -> f64;
    fn seek(&mut self, seconds: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn paused(&self) -> bool;
    fn muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
    /// Standard media error code (1..=4) of the last failure, if any.
    fn error_code(&self) -> Option<u16>;
}

/// Wall clock in milliseconds, on the same time base as frame timestamps.
pub trait TimeSource {
    fn now_ms(&self) -> f64;
}

/// [`TimeSource`] counting from its own creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    origin: Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Handle for one scheduled display-frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(u64);

/// Extrapolates an authoritative time forward by elapsed frame time.
///
/// At most one frame request is outstanding. Cancelling just forgets the
/// token, so a callback delivered for a stale token is ignored.
pub struct InterpolatedClock<C> {
    time_source: C,
    value_ms: Option<i64>,
    max_ms: i64,
    active: bool,
    last_timestamp: Option<f64>,
    pending: Option<FrameRequest>,
    next_request: u64,
}

impl<C: TimeSource> InterpolatedClock<C> {
    pub fn new(time_source: C) -> Self {
        Self {
            time_source,
            value_ms: None,
            max_ms: 0,
            active: false,
            last_timestamp: None,
            pending: None,
            next_request: 0,
        }
    }

    pub fn value_ms(&self) -> Option<i64> {
        self.value_ms
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn set_max_ms(&mut self, max_ms: i64) {
        self.max_ms = max_ms.max(0);
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if active {
            self.request_frame();
        } else {
            self.pending = None;
        }
    }

    /// Takes an authoritative time; returns the clamped value now published.
    pub fn set(&mut self, time_ms: i64) -> i64 {
        self.pending = None;
        let value = constrain_ms(time_ms, 0, self.max_ms);
        self.value_ms = Some(value);
        self.last_timestamp = Some(self.time_source.now_ms());
        if self.active {
            self.request_frame();
        }
        value
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.value_ms = None;
        self.last_timestamp = None;
    }

    /// Advances by the time since the previous frame; `None` when nothing
    /// was published.
    pub fn tick(&mut self, request: FrameRequest, timestamp_ms: f64) -> Option<i64> {
        if self.pending != Some(request) {
            return None;
        }
        self.pending = None;
        if !self.active {
            return None;
        }
        let value = self.value_ms?;
        let Some(last) = self.last_timestamp else {
            self.last_timestamp = Some(timestamp_ms);
            self.request_frame();
            return None;
        };

        let elapsed = (timestamp_ms - last).floor() as i64;
        let value = constrain_ms(value + elapsed, 0, self.max_ms);
        self.value_ms = Some(value);
        self.last_timestamp = Some(timestamp_ms);
        self.request_frame();
        Some(value)
    }

    fn request_frame(&mut self) {
        if self.pending.is_some() {
            return;
        }
        self.next_request += 1;
        self.pending = Some(FrameRequest(self.next_request));
    }
}

pub struct PlaybackAdapter<M, C> {
    media: M,
    clock: InterpolatedClock<C>,
    source: Option<String>,
    loop_range: Option<TimeRange>,
    restart_pending: bool,
    current_time_ms: ObservableProperty<i64>,
    duration_ms: ObservableProperty<i64>,
    video_size: ObservableProperty<Size>,
    playing: ObservableProperty<bool>,
    muted: ObservableProperty<bool>,
    preview: ObservableProperty<PreviewSelect>,
    loaded: ObservableEmitter<()>,
    error: ObservableEmitter<MediaError>,
}

impl<M: MediaElement, C: TimeSource> PlaybackAdapter<M, C> {
    pub fn new(media: M, time_source: C) -> Self {
        let muted = media.muted();
        Self {
            media,
            clock: InterpolatedClock::new(time_source),
            source: None,
            loop_range: None,
            restart_pending: false,
            current_time_ms: ObservableProperty::new(0),
            duration_ms: ObservableProperty::new(0),
            video_size: ObservableProperty::new(Size::default()),
            playing: ObservableProperty::new(false).log_with("PlaybackAdapter.playing"),
            muted: ObservableProperty::new(muted),
            preview: ObservableProperty::new(PreviewSelect::None)
                .log_with("PlaybackAdapter.preview"),
            loaded: ObservableEmitter::new().log_with("PlaybackAdapter.loaded"),
            error: ObservableEmitter::new().log_with("PlaybackAdapter.error"),
        }
    }

    pub fn current_time_ms(&self) -> ReadOnlyProperty<i64> {
        self.current_time_ms.as_read_only()
    }

    pub fn duration_ms(&self) -> ReadOnlyProperty<i64> {
        self.duration_ms.as_read_only()
    }

    pub fn video_size(&self) -> ReadOnlyProperty<Size> {
        self.video_size.as_read_only()
    }

    pub fn playing(&self) -> ReadOnlyProperty<bool> {
        self.playing.as_read_only()
    }

    pub fn muted(&self) -> ReadOnlyProperty<bool> {
        self.muted.as_read_only()
    }

    pub fn preview(&self) -> ReadOnlyProperty<PreviewSelect> {
        self.preview.as_read_only()
    }

    /// Fires after new metadata has been published.
    pub fn loaded_metadata(&self) -> ReadOnlyEmitter<()> {
        self.loaded.as_read_only()
    }

    pub fn error(&self) -> ReadOnlyEmitter<MediaError> {
        self.error.as_read_only()
    }

    pub fn loop_time_range(&self) -> Option<TimeRange> {
        self.loop_range
    }

    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.clock.pending_frame()
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    // Element events.

    pub fn on_loaded_metadata(&mut self) {
        let was_playing = !self.media.paused();
        self.media.pause();
        self.clock.reset();

        let seconds = self.media.duration_seconds();
        let duration_ms = if seconds.is_finite() && seconds > 0.0 {
            (seconds * 1000.0).floor() as i64
        } else {
            0
        };
        let size = self.media.video_size();
        debug!(
            duration_ms,
            width = size.width,
            height = size.height,
            "media metadata loaded"
        );

        self.clock.set_max_ms(duration_ms);
        self.duration_ms.set(duration_ms);
        self.video_size.set(size);
        self.loop_range = None;
        self.restart_pending = false;
        let time = self.clock.set(0);
        self.current_time_ms.set(time);
        self.loaded.emit(());

        if was_playing {
            self.media.play();
        }
    }

    pub fn on_error(&mut self) {
        let error = MediaError::from_code(self.media.error_code());
        warn!(%error, source = ?self.source, "media element failed");
        self.error.emit(error);
    }

    pub fn on_time_update(&mut self) {
        let seconds = self.media.current_time_seconds();
        if !seconds.is_finite() {
            return;
        }
        let time = self.clock.set((seconds * 1000.0).floor() as i64);
        self.publish_time(time);
    }

    pub fn on_volume_change(&mut self) {
        self.muted.set(self.media.muted());
    }

    pub fn on_play(&mut self) {
        self.playing.set(true);
        self.clock.set_active(true);
        self.preview.set(PreviewSelect::None);
        self.update_preview();
    }

    pub fn on_pause(&mut self) {
        self.playing.set(false);
        self.clock.set_active(false);
    }

    /// Display-frame callback for a request returned by [`Self::pending_frame`].
    pub fn on_animation_frame(&mut self, request: FrameRequest, timestamp_ms: f64) {
        if let Some(time) = self.clock.tick(request, timestamp_ms) {
            self.publish_time(time);
        }
    }

    fn publish_time(&mut self, time_ms: i64) {
        self.current_time_ms.set(time_ms);
        self.enforce_loop(time_ms);
    }

    fn enforce_loop(&mut self, time_ms: i64) {
        let Some(range) = self.loop_range else {
            return;
        };
        if self.playing.get() && !self.restart_pending && time_ms >= range.end_ms {
            debug!(start_ms = range.start_ms, end_ms = range.end_ms, "loop restart");
            self.restart_pending = true;
            self.media.pause();
            self.media.seek(ms_to_seconds(range.start_ms));
            let time = self.clock.set(range.start_ms);
            self.current_time_ms.set(time);
            self.media.play();
        } else if self.restart_pending {
            self.restart_pending = false;
            if self.media.paused() {
                self.media.play();
            }
        }
    }

    // Controls.

    /// Loads `url` unless it is already the current source.
    pub fn set_source(&mut self, url: &str) {
        if self.source.as_deref() == Some(url) {
            return;
        }
        debug!(url, "media source replaced");
        self.source = Some(url.to_string());
        self.media.set_source(url);
    }

    pub fn set_current_time_ms(&mut self, time_ms: i64) {
        let time_ms = constrain_ms(time_ms, 0, self.duration_ms.get());
        self.media.seek(ms_to_seconds(time_ms));
    }

    /// Sets the range playback loops over, clamped to the duration.
    pub fn set_loop_time_range(&mut self, range: Option<TimeRange>) {
        let duration = self.duration_ms.get();
        self.loop_range = range.map(|range| {
            TimeRange::new(
                constrain_ms(range.start_ms, 0, duration),
                constrain_ms(range.end_ms, 0, duration),
            )
        });
        self.update_preview();
    }

    /// Parks the paused preview on a loop boundary; ignored while playing.
    pub fn select_preview(&mut self, select: PreviewSelect) {
        if self.playing.get() {
            return;
        }
        let select = match select {
            PreviewSelect::Toggle if self.preview.get() == PreviewSelect::End => {
                PreviewSelect::Start
            }
            PreviewSelect::Toggle => PreviewSelect::End,
            other => other,
        };
        self.preview.set(select);
        self.update_preview();
    }

    fn update_preview(&mut self) {
        let Some(range) = self.loop_range else {
            return;
        };
        match self.preview.get() {
            PreviewSelect::Start => self.media.seek(ms_to_seconds(range.start_ms)),
            PreviewSelect::End => self.media.seek(ms_to_seconds(range.end_ms)),
            PreviewSelect::None | PreviewSelect::Toggle => {}
        }
    }

    pub fn play(&mut self) {
        self.media.play();
    }

    pub fn pause(&mut self) {
        self.media.pause();
    }

    pub fn toggle_play_pause(&mut self) {
        if self.media.paused() {
            self.media.play();
        } else {
            self.media.pause();
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.media.set_muted(muted);
    }

    pub fn toggle_mute(&mut self) {
        let muted = self.media.muted();
        self.media.set_muted(!muted);
    }
}

fn ms_to_seconds(time_ms: i64) -> f64 {
    time_ms as f64 / 1000.0
}
