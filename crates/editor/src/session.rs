//! Wires the model, the editors, the playback adapter and the options into
//! one editing session.
//!
//! Components never call each other. Their observers push [`Intent`]s onto a
//! queue that [`Session::handle`] drains after applying each input, so every
//! state change runs on the caller's thread, one at a time, in emission order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::command::{Clipboard, Command, CommandOptions, build_commands, copy_commands, pipeline_text};
use crate::config::EditorConfig;
use crate::crop::{CropEditor, display_labels};
use crate::error::{EditorError, MediaError, Result};
use crate::geometry::{Point, Rect, Size, TimeRange};
use crate::model::{VideoModel, VideoProperties};
use crate::observable::{Observer, observer};
use crate::options::OptionsEditor;
use crate::pipeline::RunJob;
use crate::playback::{FrameRequest, MediaElement, PlaybackAdapter, PreviewSelect, TimeSource};
use crate::time_range::{Marker, Modifiers, TimeRangeEditor, TweakButton, TweakTarget};

/// User and host input, one variant per interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// A file was chosen; `confirmed` acknowledges discarding current edits.
    SelectFile {
        filename: String,
        url: String,
        confirmed: bool,
    },
    MediaLoadedMetadata,
    MediaError,
    MediaTimeUpdate,
    MediaVolumeChange,
    MediaPlay,
    MediaPause,
    AnimationFrame {
        request: FrameRequest,
        timestamp_ms: f64,
    },
    Key(String),
    CropToggle,
    CropReset,
    CanvasResize(Size),
    CropPointerDown(Point),
    CropPointerMove(Point),
    CropPointerUp,
    MarkerPointerDown(Marker),
    TimespanPointerDown(Point),
    TimespanClick,
    TimelinePointerMove { pointer: Point, timeline: Rect },
    ProgressClick { pointer: Point, progress: Rect },
    ProgressPointerDown { pointer: Point, progress: Rect },
    ProgressPointerMove { pointer: Point, progress: Rect },
    TimelinePointerUp,
    Tweak {
        target: TweakTarget,
        button: TweakButton,
        modifiers: Modifiers,
    },
    TweakLabelClick(TweakTarget),
    SetScalePercent(f64),
    SetScaleWidth(f64),
    SetScaleHeight(f64),
    SetFormat(String),
    SetInputBaseName(String),
    SetOutputBaseName(String),
    ResetInputName,
    ResetOutputName,
}

/// What the host should reflect after an input.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    FileRejected { filename: String },
    FileLoaded(VideoProperties),
    MediaFailed(MediaError),
    PlayingChanged(bool),
    MutedChanged(bool),
    CommandsChanged(Vec<Command>),
}

#[derive(Debug, Clone, PartialEq)]
enum Intent {
    Loaded,
    MediaFailed(MediaError),
    CurrentTime(i64),
    Playing(bool),
    Muted(bool),
    Preview(PreviewSelect),
    PickCurrentTime(i64),
    PickStart(i64),
    PickEnd(i64),
    PickRangeStart(i64),
    SelectPreview(PreviewSelect),
    CropResize(Rect),
    CropMove(Rect),
    ModelFilename(Option<String>),
    ModelDuration(i64),
    ModelCrop(Rect),
    ModelTrim(TimeRange),
    Options(CommandOptions),
}

type IntentQueue = Rc<RefCell<VecDeque<Intent>>>;

fn forward<T: Clone + 'static>(queue: &IntentQueue, wrap: fn(T) -> Intent) -> Observer<T> {
    let queue = Rc::clone(queue);
    observer(move |value: &T| queue.borrow_mut().push_back(wrap(value.clone())))
}

pub struct Session<M, C> {
    queue: IntentQueue,
    selected_file: Option<String>,
    model: VideoModel,
    crop: CropEditor,
    time_range: TimeRangeEditor,
    playback: PlaybackAdapter<M, C>,
    options: OptionsEditor,
    commands: Vec<Command>,
}

impl<M: MediaElement, C: TimeSource> Session<M, C> {
    /// Builds every component and connects their outputs.
    ///
    /// `canvas` is the crop canvas size and `canvas_inset` its padding plus
    /// border width.
    pub fn new(config: &EditorConfig, media: M, time_source: C, canvas: Size, canvas_inset: f64) -> Self {
        let session = Self {
            queue: Rc::new(RefCell::new(VecDeque::new())),
            selected_file: None,
            model: VideoModel::new(config),
            crop: CropEditor::new(config, canvas, canvas_inset),
            time_range: TimeRangeEditor::new(),
            playback: PlaybackAdapter::new(media, time_source),
            options: OptionsEditor::new(config),
            commands: Vec::new(),
        };
        session.connect();
        session
    }

    fn connect(&self) {
        let queue = &self.queue;

        self.playback
            .loaded_metadata()
            .subscribe(forward(queue, |_: ()| Intent::Loaded));
        self.playback
            .error()
            .subscribe(forward(queue, Intent::MediaFailed));
        self.playback
            .current_time_ms()
            .subscribe(forward(queue, Intent::CurrentTime));
        self.playback.playing().subscribe(forward(queue, Intent::Playing));
        self.playback.muted().subscribe(forward(queue, Intent::Muted));
        self.playback.preview().subscribe(forward(queue, Intent::Preview));

        self.time_range
            .current_time_picked()
            .subscribe(forward(queue, Intent::PickCurrentTime));
        self.time_range
            .start_time_picked()
            .subscribe(forward(queue, Intent::PickStart));
        self.time_range
            .end_time_picked()
            .subscribe(forward(queue, Intent::PickEnd));
        self.time_range
            .range_start_picked()
            .subscribe(forward(queue, Intent::PickRangeStart));
        self.time_range
            .preview_select()
            .subscribe(forward(queue, Intent::SelectPreview));

        self.crop.crop_resize().subscribe(forward(queue, Intent::CropResize));
        self.crop.crop_move().subscribe(forward(queue, Intent::CropMove));

        self.model.filename().subscribe(forward(queue, Intent::ModelFilename));
        self.model.duration_ms().subscribe(forward(queue, Intent::ModelDuration));
        self.model.crop().subscribe(forward(queue, Intent::ModelCrop));
        self.model.trim().subscribe(forward(queue, Intent::ModelTrim));

        self.options
            .command_options()
            .subscribe(forward(queue, Intent::Options));
    }

    pub fn model(&self) -> &VideoModel {
        &self.model
    }

    pub fn crop_editor(&self) -> &CropEditor {
        &self.crop
    }

    pub fn time_range_editor(&self) -> &TimeRangeEditor {
        &self.time_range
    }

    pub fn playback(&self) -> &PlaybackAdapter<M, C> {
        &self.playback
    }

    pub fn selected_file(&self) -> Option<&str> {
        self.selected_file.as_deref()
    }

    pub fn options(&self) -> &OptionsEditor {
        &self.options
    }

    /// Pipeline for the current options; empty until a video is loaded.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn command_text(&self) -> String {
        pipeline_text(&self.commands)
    }

    /// `("WxH", "x,y WxH")` for the loaded video and its crop.
    pub fn crop_labels(&self) -> (String, String) {
        display_labels(self.model.crop().get(), self.model.size().get())
    }

    pub fn copy_commands<B: Clipboard + ?Sized>(&self, clipboard: &mut B) -> bool {
        copy_commands(clipboard, &self.commands)
    }

    /// Job for running the current pipeline on the loaded file's bytes.
    pub fn run_job(&self, input_data: Vec<u8>) -> Result<RunJob> {
        if self.model.filename().get().is_none() {
            return Err(EditorError::NoVideoLoaded);
        }
        if input_data.is_empty() {
            return Err(EditorError::MissingRunInput {
                what: "input file contents",
            });
        }
        Ok(RunJob::from_options(
            &self.options.command_options().get(),
            input_data,
        ))
    }

    /// Applies one input, then settles every resulting intent.
    ///
    /// A changed pipeline is reported once, after the last intent.
    pub fn handle(&mut self, input: Input) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let previous_commands = self.commands.clone();
        self.dispatch(input, &mut events);
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(intent) = next else {
                break;
            };
            self.apply(intent, &mut events);
        }
        if self.commands != previous_commands {
            events.push(SessionEvent::CommandsChanged(self.commands.clone()));
        }
        events
    }

    fn dispatch(&mut self, input: Input, events: &mut Vec<SessionEvent>) {
        match input {
            Input::SelectFile {
                filename,
                url,
                confirmed,
            } => self.select_file(filename, url, confirmed, events),
            Input::MediaLoadedMetadata => self.playback.on_loaded_metadata(),
            Input::MediaError => self.playback.on_error(),
            Input::MediaTimeUpdate => self.playback.on_time_update(),
            Input::MediaVolumeChange => self.playback.on_volume_change(),
            Input::MediaPlay => self.playback.on_play(),
            Input::MediaPause => self.playback.on_pause(),
            Input::AnimationFrame {
                request,
                timestamp_ms,
            } => self.playback.on_animation_frame(request, timestamp_ms),
            Input::Key(key) => self.key_down(&key),
            Input::CropToggle => {
                self.crop.toggle();
            }
            Input::CropReset => self.crop.reset_crop(),
            Input::CanvasResize(canvas) => self.crop.resize_canvas(canvas),
            Input::CropPointerDown(pointer) => self.crop.pointer_down(pointer),
            Input::CropPointerMove(pointer) => self.crop.pointer_move(pointer),
            Input::CropPointerUp => self.crop.pointer_up(),
            Input::MarkerPointerDown(marker) => self.time_range.marker_pointer_down(marker),
            Input::TimespanPointerDown(pointer) => self.time_range.timespan_pointer_down(pointer),
            Input::TimespanClick => self.time_range.timespan_click(),
            Input::TimelinePointerMove { pointer, timeline } => {
                self.time_range.timeline_pointer_move(pointer, timeline)
            }
            Input::ProgressClick { pointer, progress } => {
                self.time_range.progress_click(pointer, progress)
            }
            Input::ProgressPointerDown { pointer, progress } => {
                self.time_range.progress_pointer_down(pointer, progress)
            }
            Input::ProgressPointerMove { pointer, progress } => {
                self.time_range.progress_pointer_move(pointer, progress)
            }
            Input::TimelinePointerUp => self.time_range.pointer_up(),
            Input::Tweak {
                target,
                button,
                modifiers,
            } => self.time_range.tweak(target, button, modifiers),
            Input::TweakLabelClick(target) => self.time_range.tweak_label_click(target),
            Input::SetScalePercent(percent) => self.options.set_scale_percent(percent),
            Input::SetScaleWidth(width) => self.options.set_scale_width(width),
            Input::SetScaleHeight(height) => self.options.set_scale_height(height),
            Input::SetFormat(name) => self.options.set_format_name(&name),
            Input::SetInputBaseName(base) => self.options.set_input_base_name(&base),
            Input::SetOutputBaseName(base) => self.options.set_output_base_name(&base),
            Input::ResetInputName => self.options.reset_input_name(),
            Input::ResetOutputName => self.options.reset_output_name(),
        }
    }

    fn select_file(&mut self, filename: String, url: String, confirmed: bool, events: &mut Vec<SessionEvent>) {
        if self.selected_file.as_deref() == Some(filename.as_str()) {
            return;
        }
        if self.model.is_modified() && !confirmed {
            info!(filename = %filename, "file selection rejected over unsaved edits");
            events.push(SessionEvent::FileRejected { filename });
            return;
        }
        debug!(filename = %filename, "file selected");
        self.model.clear();
        self.selected_file = Some(filename);
        self.playback.set_source(&url);
    }

    fn key_down(&mut self, key: &str) {
        match key {
            " " => self.playback.toggle_play_pause(),
            "m" => self.playback.toggle_mute(),
            other => {
                if !self.time_range.key_down(other) {
                    debug!(key = other, "key ignored");
                }
            }
        }
    }

    /// A clamped pick leaves the trim unchanged and fires no model event, so
    /// the editor is told the accepted range explicitly.
    fn echo_trim(&mut self) {
        self.time_range.set_timespan(self.model.trim().get());
    }

    fn apply(&mut self, intent: Intent, events: &mut Vec<SessionEvent>) {
        match intent {
            Intent::Loaded => {
                let properties = VideoProperties {
                    filename: self.selected_file.clone(),
                    size: self.playback.video_size().get(),
                    duration_ms: self.playback.duration_ms().get(),
                };
                self.model.set_properties(properties.clone());
                events.push(SessionEvent::FileLoaded(properties));
            }
            Intent::MediaFailed(error) => {
                if self.model.filename().get().is_none() {
                    warn!(%error, "load failed, selection reset");
                    self.selected_file = None;
                }
                events.push(SessionEvent::MediaFailed(error));
            }
            Intent::CurrentTime(time_ms) => self.time_range.set_current_time_ms(time_ms),
            Intent::Playing(playing) => events.push(SessionEvent::PlayingChanged(playing)),
            Intent::Muted(muted) => events.push(SessionEvent::MutedChanged(muted)),
            Intent::Preview(preview) => self.crop.set_preview(preview),
            Intent::PickCurrentTime(time_ms) => self.playback.set_current_time_ms(time_ms),
            Intent::PickStart(time_ms) => {
                self.model.set_start_time_ms(time_ms);
                self.echo_trim();
            }
            Intent::PickEnd(time_ms) => {
                self.model.set_end_time_ms(time_ms);
                self.echo_trim();
            }
            Intent::PickRangeStart(time_ms) => {
                self.model.set_span_start_ms(time_ms);
                self.echo_trim();
            }
            Intent::SelectPreview(select) => self.playback.select_preview(select),
            Intent::CropResize(ratio) => self.model.update_crop(ratio, false),
            Intent::CropMove(ratio) => self.model.update_crop(ratio, true),
            Intent::ModelFilename(filename) => self.options.set_source_filename(filename.as_deref()),
            Intent::ModelDuration(duration_ms) => self.time_range.set_duration_ms(duration_ms),
            Intent::ModelCrop(crop) => {
                let size = self.model.size().get();
                if size.is_empty() {
                    self.options.set_crop(None);
                } else {
                    self.crop.set_crop(crop.to_ratio_rect(size));
                    self.options.set_crop(Some(crop));
                }
            }
            Intent::ModelTrim(trim) => {
                let loaded = self.model.duration_ms().get() > 0;
                self.time_range.set_timespan(trim);
                self.playback.set_loop_time_range(loaded.then_some(trim));
                self.options.set_time_range(loaded.then_some(trim));
            }
            Intent::Options(options) => {
                self.commands = if self.model.filename().get().is_some() {
                    build_commands(&options)
                } else {
                    Vec::new()
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Input, Session, SessionEvent};
    use crate::config::EditorConfig;
    use crate::error::{EditorError, MediaError};
    use crate::geometry::Size;
    use crate::playback::{MediaElement, TimeSource};

    struct StillMedia;

    impl MediaElement for StillMedia {
        fn set_source(&mut self, _url: &str) {}
        fn duration_seconds(&self) -> f64 {
            4.0
        }
        fn video_size(&self) -> Size {
            Size::new(320.0, 240.0)
        }
        fn current_time_seconds(&self) -> f64 {
            0.0
        }
        fn seek(&mut self, _seconds: f64) {}
        fn play(&mut self) {}
        fn pause(&mut self) {}
        fn paused(&self) -> bool {
            true
        }
        fn muted(&self) -> bool {
            false
        }
        fn set_muted(&mut self, _muted: bool) {}
        fn error_code(&self) -> Option<u16> {
            Some(4)
        }
    }

    struct Frozen;

    impl TimeSource for Frozen {
        fn now_ms(&self) -> f64 {
            0.0
        }
    }

    fn session() -> Session<StillMedia, Frozen> {
        Session::new(
            &EditorConfig::default(),
            StillMedia,
            Frozen,
            Size::new(320.0, 240.0),
            0.0,
        )
    }

    #[test]
    fn no_commands_and_no_run_before_a_video_loads() {
        let session = session();
        assert!(session.commands().is_empty());
        assert!(matches!(
            session.run_job(b"bytes".to_vec()),
            Err(EditorError::NoVideoLoaded)
        ));
    }

    fn select(session: &mut Session<StillMedia, Frozen>, filename: &str) -> Vec<SessionEvent> {
        session.handle(Input::SelectFile {
            filename: filename.to_string(),
            url: format!("blob:{filename}"),
            confirmed: false,
        })
    }

    #[test]
    fn load_failure_before_metadata_resets_selection() {
        let mut session = session();
        select(&mut session, "broken.mp4");
        assert_eq!(session.selected_file(), Some("broken.mp4"));

        let events = session.handle(Input::MediaError);

        assert_eq!(
            events,
            vec![SessionEvent::MediaFailed(MediaError::SourceNotSupported)]
        );
        assert_eq!(session.selected_file(), None);
    }

    #[test]
    fn load_failure_after_metadata_keeps_the_loaded_file() {
        let mut session = session();
        select(&mut session, "clip.mp4");
        session.handle(Input::MediaLoadedMetadata);

        session.handle(Input::MediaError);

        assert_eq!(session.selected_file(), Some("clip.mp4"));
    }

    #[test]
    fn loaded_session_requires_input_bytes_for_a_run() {
        let mut session = session();
        select(&mut session, "clip.mp4");
        session.handle(Input::MediaLoadedMetadata);

        assert!(matches!(
            session.run_job(Vec::new()),
            Err(EditorError::MissingRunInput { .. })
        ));
        let job = session.run_job(b"bytes".to_vec()).expect("job");
        assert_eq!(job.input_filename, "clip.mp4");
        assert_eq!(job.commands, session.commands());
    }
}
