//! Trim range editing over a timeline: marker drags, span drags, scrubbing,
//! nudge buttons and keyboard shortcuts.
//!
//! Like the crop editor this component only publishes requests. The owner
//! applies them to the model and echoes the accepted range back through
//! [`TimeRangeEditor::set_timespan`].

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::format::format_duration;
use crate::geometry::{Point, Rect, TimeRange, constrain};
use crate::observable::{MappedEmitter, ObservableEmitter, ReadOnlyEmitter};
use crate::playback::PreviewSelect;

/// Nudge sizes from finest to coarsest.
pub const STEP_SIZES_MS: [i64; 6] = [5, 50, 1_000, 10_000, 60_000, 300_000];

pub const SEEK_LARGE_MS: i64 = 10_000;
pub const SEEK_SMALL_MS: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step(usize);

impl Step {
    /// Step used by the fine nudge buttons.
    pub const FINE: Step = Step(1);
    /// Step used by the coarse nudge buttons.
    pub const COARSE: Step = Step(4);

    pub fn ms(self) -> i64 {
        STEP_SIZES_MS[self.0]
    }

    pub fn finer(self) -> Step {
        Step(self.0.saturating_sub(1))
    }

    pub fn coarser(self) -> Step {
        Step((self.0 + 1).min(STEP_SIZES_MS.len() - 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Earlier,
    Later,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub direction: Direction,
    pub step: Step,
}

impl Adjustment {
    pub fn delta_ms(self) -> i64 {
        match self.direction {
            Direction::Earlier => -self.step.ms(),
            Direction::Later => self.step.ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweakTarget {
    Start,
    End,
    Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TweakButton {
    pub direction: Direction,
    pub coarse: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Marker(Marker),
    Span { origin_x: f64, start_ratio: f64 },
    Scrub,
}

pub struct TimeRangeEditor {
    duration_ms: Rc<Cell<i64>>,
    current_time_ms: i64,
    timespan: TimeRange,
    start_ratio: f64,
    end_ratio: f64,
    last_start_ms: i64,
    last_end_ms: i64,
    drag: Option<Drag>,
    start_ratios: ObservableEmitter<f64>,
    end_ratios: ObservableEmitter<f64>,
    span_ratios: ObservableEmitter<f64>,
    start_time: MappedEmitter<f64, i64>,
    end_time: MappedEmitter<f64, i64>,
    range_start: MappedEmitter<f64, i64>,
    current_time_picked: ObservableEmitter<i64>,
    preview_select: ObservableEmitter<PreviewSelect>,
}

fn ratio_to_ms(duration_ms: i64, ratio: f64) -> i64 {
    (duration_ms as f64 * ratio).floor() as i64
}

impl TimeRangeEditor {
    pub fn new() -> Self {
        let duration_ms = Rc::new(Cell::new(0));
        let start_ratios = ObservableEmitter::new();
        let end_ratios = ObservableEmitter::new();
        let span_ratios = ObservableEmitter::new();

        let mapped = |source: &ObservableEmitter<f64>| {
            let duration = Rc::clone(&duration_ms);
            source
                .as_read_only()
                .map_writable(move |ratio: &f64| ratio_to_ms(duration.get(), *ratio))
        };
        let start_time = mapped(&start_ratios);
        let end_time = mapped(&end_ratios);
        let range_start = mapped(&span_ratios);

        Self {
            duration_ms,
            current_time_ms: 0,
            timespan: TimeRange::default(),
            start_ratio: 0.0,
            end_ratio: 0.0,
            last_start_ms: 0,
            last_end_ms: 0,
            drag: None,
            start_ratios,
            end_ratios,
            span_ratios,
            start_time,
            end_time,
            range_start,
            current_time_picked: ObservableEmitter::new()
                .log_with("TimeRangeEditor.current_time_picked"),
            preview_select: ObservableEmitter::new().log_with("TimeRangeEditor.preview_select"),
        }
    }

    /// Requested trim start in milliseconds.
    pub fn start_time_picked(&self) -> ReadOnlyEmitter<i64> {
        self.start_time.as_read_only()
    }

    pub fn end_time_picked(&self) -> ReadOnlyEmitter<i64> {
        self.end_time.as_read_only()
    }

    /// Requested start of the whole span, duration unchanged.
    pub fn range_start_picked(&self) -> ReadOnlyEmitter<i64> {
        self.range_start.as_read_only()
    }

    /// Requested absolute playback position.
    pub fn current_time_picked(&self) -> ReadOnlyEmitter<i64> {
        self.current_time_picked.as_read_only()
    }

    pub fn preview_select(&self) -> ReadOnlyEmitter<PreviewSelect> {
        self.preview_select.as_read_only()
    }

    // State echoed from the owner.

    pub fn set_duration_ms(&mut self, duration_ms: i64) {
        self.duration_ms.set(duration_ms.max(0));
        self.update_ratios();
    }

    pub fn set_current_time_ms(&mut self, time_ms: i64) {
        self.current_time_ms = time_ms;
    }

    pub fn set_timespan(&mut self, timespan: TimeRange) {
        self.timespan = timespan;
        self.last_start_ms = timespan.start_ms;
        self.last_end_ms = timespan.end_ms;
        self.update_ratios();
    }

    fn update_ratios(&mut self) {
        let denominator = self.duration_ms.get().max(1) as f64;
        self.start_ratio = self.timespan.start_ms as f64 / denominator;
        self.end_ratio = self.timespan.end_ms as f64 / denominator;
    }

    // Displays.

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms.get()
    }

    /// Marker positions as fractions of the timeline.
    pub fn marker_ratios(&self) -> (f64, f64) {
        (self.start_ratio, self.end_ratio)
    }

    pub fn progress_ratio(&self) -> f64 {
        self.current_time_ms as f64 / self.duration_ms.get().max(1) as f64
    }

    pub fn start_display(&self) -> String {
        format_duration(self.timespan.start_ms)
    }

    pub fn end_display(&self) -> String {
        format_duration(self.timespan.end_ms)
    }

    pub fn span_display(&self) -> String {
        format_duration(self.timespan.duration_ms())
    }

    /// `"<current> / <duration>"`.
    pub fn main_display(&self) -> String {
        format!(
            "{} / {}",
            format_duration(self.current_time_ms),
            format_duration(self.duration_ms.get())
        )
    }

    // Pointer input. Positions are in the same coordinates as the rects.

    pub fn marker_pointer_down(&mut self, marker: Marker) {
        self.drag = Some(Drag::Marker(marker));
        self.preview_select.emit(match marker {
            Marker::Start => PreviewSelect::Start,
            Marker::End => PreviewSelect::End,
        });
    }

    pub fn timespan_pointer_down(&mut self, pointer: Point) {
        self.drag = Some(Drag::Span {
            origin_x: pointer.x,
            start_ratio: self.start_ratio,
        });
    }

    pub fn timespan_click(&mut self) {
        self.preview_select.emit(PreviewSelect::Toggle);
    }

    /// Pointer motion over the trim timeline while a marker or the span is
    /// being dragged.
    pub fn timeline_pointer_move(&mut self, pointer: Point, timeline: Rect) {
        if timeline.width() <= 0.0 {
            return;
        }
        match self.drag {
            Some(Drag::Marker(marker)) => {
                let ratio = constrain(timeline.ratio_point(pointer).x, 0.0, 1.0);
                self.emit_marker_ratio(marker, ratio);
            }
            Some(Drag::Span {
                origin_x,
                start_ratio,
            }) => {
                let delta = constrain((pointer.x - origin_x) / timeline.width(), -1.0, 1.0);
                let ratio = start_ratio + delta;
                trace!(ratio, "span dragged");
                let span_ms = self.last_end_ms - self.last_start_ms;
                self.last_start_ms =
                    self.clamp_to_duration(ratio_to_ms(self.duration_ms.get(), ratio), span_ms);
                self.span_ratios.emit(ratio);
            }
            Some(Drag::Scrub) | None => {}
        }
    }

    fn emit_marker_ratio(&mut self, marker: Marker, ratio: f64) {
        let time_ms = ratio_to_ms(self.duration_ms.get(), ratio);
        match marker {
            Marker::Start => {
                self.last_start_ms = time_ms;
                self.start_time.emit_mapped(ratio);
            }
            Marker::End => {
                self.last_end_ms = time_ms;
                self.end_time.emit_mapped(ratio);
            }
        }
    }

    pub fn progress_click(&mut self, pointer: Point, progress: Rect) {
        self.pick_from_progress(pointer, progress);
    }

    pub fn progress_pointer_down(&mut self, pointer: Point, progress: Rect) {
        self.drag = Some(Drag::Scrub);
        self.pick_from_progress(pointer, progress);
    }

    pub fn progress_pointer_move(&mut self, pointer: Point, progress: Rect) {
        if self.drag == Some(Drag::Scrub) {
            self.pick_from_progress(pointer, progress);
        }
    }

    fn pick_from_progress(&mut self, pointer: Point, progress: Rect) {
        if progress.width() <= 0.0 {
            return;
        }
        let ratio = constrain(progress.ratio_point(pointer).x, 0.0, 1.0);
        self.preview_select.emit(PreviewSelect::None);
        self.current_time_picked
            .emit(ratio_to_ms(self.duration_ms.get(), ratio));
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    // Buttons and keys.

    /// Nudges a boundary (or the whole span) from its last published value.
    pub fn tweak(&mut self, target: TweakTarget, button: TweakButton, modifiers: Modifiers) {
        let base = if button.coarse { Step::COARSE } else { Step::FINE };
        let step = if modifiers.ctrl {
            base.finer()
        } else if modifiers.shift {
            base.coarser()
        } else {
            base
        };
        let adjustment = Adjustment {
            direction: button.direction,
            step,
        };
        self.apply_adjustment(target, adjustment);
        self.tweak_label_click(target);
    }

    pub fn apply_adjustment(&mut self, target: TweakTarget, adjustment: Adjustment) {
        let delta = adjustment.delta_ms();
        debug!(?target, delta_ms = delta, "trim nudged");
        match target {
            TweakTarget::Start => {
                self.last_start_ms = self.clamp_to_duration(self.last_start_ms + delta, 0);
                self.start_time.emit_direct(self.last_start_ms);
            }
            TweakTarget::End => {
                self.last_end_ms = self.clamp_to_duration(self.last_end_ms + delta, 0);
                self.end_time.emit_direct(self.last_end_ms);
            }
            TweakTarget::Span => {
                let span_ms = self.last_end_ms - self.last_start_ms;
                self.last_start_ms = self.clamp_to_duration(self.last_start_ms + delta, span_ms);
                self.range_start.emit_direct(self.last_start_ms);
            }
        }
    }

    /// Keeps a nudged time inside `[0, duration - reserved_ms]`, so a nudge
    /// past either end never leaves a backlog for the opposite direction.
    fn clamp_to_duration(&self, time_ms: i64, reserved_ms: i64) -> i64 {
        let max_ms = (self.duration_ms.get() - reserved_ms.max(0)).max(0);
        time_ms.clamp(0, max_ms)
    }

    pub fn tweak_label_click(&mut self, target: TweakTarget) {
        self.preview_select.emit(match target {
            TweakTarget::Start => PreviewSelect::Start,
            TweakTarget::End => PreviewSelect::End,
            TweakTarget::Span => PreviewSelect::Toggle,
        });
    }

    /// Handles a shortcut key; returns false for keys this editor ignores.
    pub fn key_down(&mut self, key: &str) -> bool {
        match key {
            "s" => {
                self.last_start_ms = self.current_time_ms;
                self.start_time.emit_direct(self.current_time_ms);
                self.preview_select.emit(PreviewSelect::Start);
            }
            "e" => {
                self.last_end_ms = self.current_time_ms;
                self.end_time.emit_direct(self.current_time_ms);
                self.preview_select.emit(PreviewSelect::End);
            }
            "ArrowLeft" => self.seek_relative(-SEEK_LARGE_MS),
            "ArrowRight" => self.seek_relative(SEEK_LARGE_MS),
            "," => self.seek_relative(-SEEK_SMALL_MS),
            "." => self.seek_relative(SEEK_SMALL_MS),
            _ => return false,
        }
        true
    }

    fn seek_relative(&mut self, delta_ms: i64) {
        self.current_time_picked.emit(self.current_time_ms + delta_ms);
    }
}

impl Default for TimeRangeEditor {
    fn default() -> Self {
        Self::new()
    }
}
