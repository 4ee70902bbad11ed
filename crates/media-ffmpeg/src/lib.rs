mod error;
mod probe;
mod progress;
mod workspace;

pub use error::{MediaFfmpegError, Result};
pub use probe::{VideoInfo, probe_video};
pub use progress::{ProgressParser, parse_timestamp};
pub use workspace::{FfmpegOutput, TranscodeWorkspace};
