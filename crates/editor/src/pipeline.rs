//! Executes a command pipeline against a transcoder and reports status.
//!
//! A run writes the input buffer, executes every command in order, reads the
//! output buffer back and deletes both. Runs happen on a worker thread behind
//! a job/event channel pair; [`RunController`] allows one outstanding run.

use std::sync::mpsc;
use std::thread;

use tracing::{debug, info, warn};

use crate::command::{Command, CommandOptions, REMOVE_PROGRAM, build_commands};
use crate::error::{EditorError, Result};

const JOB_CHANNEL_CAPACITY: usize = 1;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Output of the transcoder while one command executes.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeEvent {
    Log(String),
    /// Raw fraction of the current command; values above 1 are noise.
    Progress(f64),
}

/// The execution engine: a named-buffer filesystem plus a command runner.
pub trait Transcoder {
    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()>;
    fn exec(&mut self, args: &[String], on_event: &mut dyn FnMut(TranscodeEvent)) -> Result<()>;
    fn delete_file(&mut self, name: &str) -> Result<()>;
    fn read_file(&mut self, name: &str) -> Result<Vec<u8>>;
}

/// One pipeline run request.
#[derive(Debug, Clone, PartialEq)]
pub struct RunJob {
    pub input_filename: String,
    pub input_data: Vec<u8>,
    pub output_filename: String,
    pub commands: Vec<Command>,
}

impl RunJob {
    pub fn from_options(options: &CommandOptions, input_data: Vec<u8>) -> Self {
        Self {
            input_filename: options.input_filename.clone(),
            input_data,
            output_filename: options.output_filename.clone(),
            commands: build_commands(options),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Status(String),
    /// Overall percentage; `None` while indeterminate.
    Progress(Option<f64>),
    Finished { filename: String, data: Vec<u8> },
    Failed { message: String },
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }
}

/// Maps per-command progress onto the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProgress {
    step: usize,
    total: usize,
}

impl StepProgress {
    pub fn new(total: usize) -> Self {
        Self {
            step: 1,
            total: total.max(1),
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// `"(i/n) "` while more than one step runs, empty otherwise.
    pub fn prefix(&self) -> String {
        if self.total > 1 {
            format!("({}/{}) ", self.step, self.total)
        } else {
            String::new()
        }
    }

    /// Overall percentage for a raw step fraction; `None` above 1.
    pub fn scale(&self, raw: f64) -> Option<f64> {
        if !raw.is_finite() || raw > 1.0 {
            return None;
        }
        let completed = (self.step - 1) as f64;
        Some((completed + raw) / self.total as f64 * 100.0)
    }

    pub fn advance(&mut self) {
        self.step = (self.step + 1).min(self.total);
    }
}

pub struct PipelineRunner<T> {
    transcoder: T,
}

impl<T: Transcoder> PipelineRunner<T> {
    pub fn new(transcoder: T) -> Self {
        Self { transcoder }
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// Runs `job` to completion and returns the output buffer.
    ///
    /// On failure every file the run may have created is deleted on a best
    /// effort basis before the error is returned.
    pub fn run(&mut self, job: &RunJob, on_event: &mut dyn FnMut(RunEvent)) -> Result<Vec<u8>> {
        let mut completed = 0;
        let result = self.run_steps(job, &mut completed, on_event);
        if result.is_err() {
            self.cleanup_after_failure(job, completed);
        }
        result
    }

    fn run_steps(
        &mut self,
        job: &RunJob,
        completed: &mut usize,
        on_event: &mut dyn FnMut(RunEvent),
    ) -> Result<Vec<u8>> {
        let transcode_steps = job
            .commands
            .iter()
            .filter(|command| matches!(command, Command::Ffmpeg(_)))
            .count();
        let mut progress = StepProgress::new(transcode_steps);
        on_event(RunEvent::Progress(None));

        self.transcoder
            .write_file(&job.input_filename, &job.input_data)?;
        status(on_event, format!("Imported file \"{}\"", job.input_filename));

        for command in &job.commands {
            match command {
                Command::Ffmpeg(ffmpeg) => {
                    let prefix = progress.prefix();
                    let scaler = progress;
                    let mut forward = |event: TranscodeEvent| match event {
                        TranscodeEvent::Log(line) => status(on_event, format!("{prefix}{line}")),
                        TranscodeEvent::Progress(raw) => {
                            if let Some(percent) = scaler.scale(raw) {
                                on_event(RunEvent::Progress(Some(percent)));
                            }
                        }
                    };
                    self.transcoder
                        .exec(&ffmpeg.args(), &mut forward)
                        .map_err(|error| EditorError::Pipeline {
                            step: format!("ffmpeg step {}/{}", scaler.step, scaler.total),
                            reason: error.to_string(),
                        })?;
                    progress.advance();
                }
                Command::File(file) if file.program == REMOVE_PROGRAM => {
                    let prefix = progress.prefix();
                    for name in &file.args {
                        self.transcoder.delete_file(name)?;
                        status(on_event, format!("{prefix}Deleted internal file \"{name}\""));
                    }
                }
                Command::File(file) => {
                    return Err(EditorError::Pipeline {
                        step: file.program.clone(),
                        reason: "unsupported file command".to_string(),
                    });
                }
            }
            *completed += 1;
        }

        let data = self.transcoder.read_file(&job.output_filename)?;
        status(on_event, format!("Exported file \"{}\"", job.output_filename));

        self.transcoder.delete_file(&job.input_filename)?;
        self.transcoder.delete_file(&job.output_filename)?;
        status(on_event, "Done.".to_string());
        Ok(data)
    }

    fn cleanup_after_failure(&mut self, job: &RunJob, completed: usize) {
        let pending_deletes = job
            .commands
            .iter()
            .skip(completed)
            .filter_map(|command| match command {
                Command::File(file) if file.program == REMOVE_PROGRAM => Some(file.args.iter()),
                _ => None,
            })
            .flatten();
        let names = std::iter::once(&job.input_filename)
            .chain(pending_deletes)
            .chain(std::iter::once(&job.output_filename));

        for name in names {
            if let Err(error) = self.transcoder.delete_file(name) {
                debug!(name, %error, "cleanup skipped file");
            }
        }
    }
}

fn status(on_event: &mut dyn FnMut(RunEvent), line: String) {
    info!(status = %line, "pipeline");
    on_event(RunEvent::Status(line));
}

/// Message shown when a run fails.
pub fn failure_status(error: &EditorError) -> String {
    format!("Something went wrong. {error}")
}

/// Sender used to submit jobs to the pipeline worker.
pub type RunJobSender = mpsc::SyncSender<RunJob>;

/// Receiver for events emitted by the pipeline worker.
pub type RunEventReceiver = mpsc::Receiver<RunEvent>;

/// Spawns a worker thread that runs submitted jobs one at a time.
pub fn spawn_pipeline_worker<T>(transcoder: T) -> (RunJobSender, RunEventReceiver)
where
    T: Transcoder + Send + 'static,
{
    let (job_tx, job_rx) = mpsc::sync_channel::<RunJob>(JOB_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::sync_channel::<RunEvent>(EVENT_CHANNEL_CAPACITY);

    thread::spawn(move || {
        let mut runner = PipelineRunner::new(transcoder);
        while let Ok(job) = job_rx.recv() {
            let mut disconnected = false;
            let result = runner.run(&job, &mut |event| {
                if !disconnected && event_tx.send(event).is_err() {
                    disconnected = true;
                }
            });
            if disconnected {
                return;
            }

            let terminal = match result {
                Ok(data) => RunEvent::Finished {
                    filename: job.output_filename.clone(),
                    data,
                },
                Err(error) => {
                    warn!(%error, "pipeline run failed");
                    let message = failure_status(&error);
                    if event_tx.send(RunEvent::Status(message.clone())).is_err() {
                        return;
                    }
                    RunEvent::Failed { message }
                }
            };
            if event_tx.send(terminal).is_err() {
                return;
            }
        }
    });

    (job_tx, event_rx)
}

/// Client side of the worker; rejects a run while another is outstanding.
pub struct RunController {
    jobs: RunJobSender,
    events: RunEventReceiver,
    running: bool,
}

impl RunController {
    pub fn new(jobs: RunJobSender, events: RunEventReceiver) -> Self {
        Self {
            jobs,
            events,
            running: false,
        }
    }

    pub fn spawn<T>(transcoder: T) -> Self
    where
        T: Transcoder + Send + 'static,
    {
        let (jobs, events) = spawn_pipeline_worker(transcoder);
        Self::new(jobs, events)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn submit(&mut self, job: RunJob) -> Result<()> {
        if self.running {
            return Err(EditorError::PipelineBusy);
        }
        debug!(
            input = %job.input_filename,
            output = %job.output_filename,
            commands = job.commands.len(),
            "pipeline run submitted"
        );
        self.jobs.send(job).map_err(|_| worker_stopped())?;
        self.running = true;
        Ok(())
    }

    /// Drains events that are already available without blocking.
    pub fn poll(&mut self) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if event.is_terminal() {
                self.running = false;
            }
            events.push(event);
        }
        events
    }

    /// Blocks until the outstanding run ends, forwarding every event.
    pub fn wait(&mut self, mut on_event: impl FnMut(RunEvent)) -> Result<()> {
        while self.running {
            let event = self.events.recv().map_err(|_| {
                self.running = false;
                worker_stopped()
            })?;
            if event.is_terminal() {
                self.running = false;
            }
            on_event(event);
        }
        Ok(())
    }
}

fn worker_stopped() -> EditorError {
    EditorError::Pipeline {
        step: "pipeline worker".to_string(),
        reason: "worker thread stopped".to_string(),
    }
}

/// [`Transcoder`] running the ffmpeg CLI inside a scratch directory.
#[derive(Debug)]
pub struct FfmpegTranscoder {
    workspace: media_ffmpeg::TranscodeWorkspace,
}

impl FfmpegTranscoder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            workspace: media_ffmpeg::TranscodeWorkspace::new()?,
        })
    }
}

impl Transcoder for FfmpegTranscoder {
    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        Ok(self.workspace.write_file(name, data)?)
    }

    fn exec(&mut self, args: &[String], on_event: &mut dyn FnMut(TranscodeEvent)) -> Result<()> {
        self.workspace.run_ffmpeg(args, &mut |output| {
            on_event(match output {
                media_ffmpeg::FfmpegOutput::Log(line) => TranscodeEvent::Log(line),
                media_ffmpeg::FfmpegOutput::Progress(fraction) => TranscodeEvent::Progress(fraction),
            })
        })?;
        Ok(())
    }

    fn delete_file(&mut self, name: &str) -> Result<()> {
        Ok(self.workspace.delete_file(name)?)
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        Ok(self.workspace.read_file(name)?)
    }
}
