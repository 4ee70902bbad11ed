//! Host-agnostic core of the clip editor: crop and trim editing, playback
//! looping and ffmpeg pipeline generation.

pub mod command;
pub mod config;
pub mod crop;
pub mod error;
pub mod format;
pub mod geometry;
pub mod model;
pub mod observable;
pub mod options;
pub mod pipeline;
pub mod playback;
pub mod session;
pub mod time_range;

pub use command::{Clipboard, Command, CommandOptions, OutputFormat, build_commands, pipeline_text};
pub use config::EditorConfig;
pub use crop::CropEditor;
pub use error::{EditorError, MediaError, Result};
pub use geometry::{Point, Rect, Size, TimeRange};
pub use model::{VideoModel, VideoProperties};
pub use options::OptionsEditor;
pub use pipeline::{FfmpegTranscoder, PipelineRunner, RunController, RunEvent, RunJob, Transcoder};
pub use playback::{MediaElement, MonotonicTimeSource, PlaybackAdapter, PreviewSelect, TimeSource};
pub use session::{Input, Session, SessionEvent};
pub use time_range::TimeRangeEditor;
