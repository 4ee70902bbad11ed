mod common;

use std::collections::BTreeMap;

use common::new_session;
use editor::command::{CommandOptions, OutputFormat, build_commands, pipeline_text};
use editor::geometry::{Point, Rect, Size, TimeRange};
use editor::pipeline::TranscodeEvent;
use editor::{EditorError, Input, PipelineRunner, RunController, RunEvent, RunJob, Transcoder};

/// Transcoder over an in-memory file map; every exec writes its last
/// argument.
#[derive(Default)]
struct MemoryTranscoder {
    files: BTreeMap<String, Vec<u8>>,
    fail_on_exec: Option<usize>,
    execs: usize,
}

impl Transcoder for MemoryTranscoder {
    fn write_file(&mut self, name: &str, data: &[u8]) -> editor::Result<()> {
        self.files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn exec(&mut self, args: &[String], on_event: &mut dyn FnMut(TranscodeEvent)) -> editor::Result<()> {
        self.execs += 1;
        if self.fail_on_exec == Some(self.execs) {
            return Err(EditorError::Pipeline {
                step: "exec".to_string(),
                reason: "encoder crashed".to_string(),
            });
        }
        on_event(TranscodeEvent::Log("frame=1".to_string()));
        on_event(TranscodeEvent::Progress(1.0));
        let output = args.last().cloned().unwrap_or_default();
        self.files.insert(output, format!("exec {}", self.execs).into_bytes());
        Ok(())
    }

    fn delete_file(&mut self, name: &str) -> editor::Result<()> {
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EditorError::Pipeline {
                step: "delete".to_string(),
                reason: format!("no file {name}"),
            })
    }

    fn read_file(&mut self, name: &str) -> editor::Result<Vec<u8>> {
        self.files.get(name).cloned().ok_or_else(|| EditorError::Pipeline {
            step: "read".to_string(),
            reason: format!("no file {name}"),
        })
    }
}

fn loaded_job() -> RunJob {
    let (mut session, _media) = new_session();
    session.handle(Input::SelectFile {
        filename: "clip.mp4".to_string(),
        url: "blob:clip".to_string(),
        confirmed: false,
    });
    session.handle(Input::MediaLoadedMetadata);
    session.handle(Input::CropToggle);
    session.handle(Input::CropPointerDown(Point::new(0.0, 0.0)));
    session.handle(Input::CropPointerMove(Point::new(100.0, 50.0)));
    session.handle(Input::CropPointerUp);
    session.run_job(b"source bytes".to_vec()).expect("loaded session should build a job")
}

#[test]
fn mp4_command_trims_crops_and_scales_in_one_pass() {
    let commands = build_commands(&CommandOptions {
        input_filename: "in.mp4".to_string(),
        output_filename: "out.mp4".to_string(),
        format: OutputFormat::Mp4,
        crop: Some(Rect::from_xywh(10.0, 20.0, 100.0, 50.0)),
        scale: Some(Size::new(200.0, 100.0)),
        time_range: Some(TimeRange::new(1_500, 3_500)),
    });

    assert_eq!(commands.len(), 1);
    assert_eq!(
        commands[0].args(),
        [
            "-i",
            "in.mp4",
            "-ss",
            "1.5",
            "-t",
            "2",
            "-vf",
            "crop=100:50:10:20,scale=200x100:flags=lanczos",
            "out.mp4",
        ]
    );
    assert_eq!(
        pipeline_text(&commands),
        "ffmpeg \"-i\" \"in.mp4\" \"-ss\" \"1.5\" \"-t\" \"2\" \"-vf\" \
         \"crop=100:50:10:20,scale=200x100:flags=lanczos\" \"out.mp4\""
    );
}

#[test]
fn gif_job_from_session_runs_three_steps_and_cleans_up() {
    let job = loaded_job();
    assert_eq!(job.commands.len(), 3);
    assert!(job.output_filename.ends_with(".gif"));

    let mut runner = PipelineRunner::new(MemoryTranscoder::default());
    let mut events = Vec::new();
    let data = runner
        .run(&job, &mut |event| events.push(event))
        .expect("pipeline should succeed");

    assert_eq!(data, b"exec 2");
    assert!(runner.transcoder().files.is_empty());
    assert_eq!(events.first(), Some(&RunEvent::Progress(None)));
    assert_eq!(events.last(), Some(&RunEvent::Status("Done.".to_string())));

    let statuses: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            RunEvent::Status(line) => Some(line.as_str()),
            _ => None,
        })
        .collect();
    assert!(statuses.contains(&"(1/2) frame=1"));
    assert!(statuses.contains(&"(2/2) frame=1"));
    assert!(
        statuses
            .iter()
            .any(|line| line.starts_with("(2/2) Deleted internal file \"tmp-"))
    );

    let percents: Vec<f64> = events
        .iter()
        .filter_map(|event| match event {
            RunEvent::Progress(Some(percent)) => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![50.0, 100.0]);
}

#[test]
fn failed_step_removes_input_intermediate_and_output() {
    let job = loaded_job();
    let mut runner = PipelineRunner::new(MemoryTranscoder {
        fail_on_exec: Some(2),
        ..MemoryTranscoder::default()
    });

    let error = runner
        .run(&job, &mut |_| {})
        .expect_err("second step should fail");

    assert!(matches!(error, EditorError::Pipeline { ref step, .. } if step == "ffmpeg step 2/2"));
    assert!(runner.transcoder().files.is_empty());
}

#[test]
fn controller_rejects_overlapping_runs_and_recovers() {
    let job = loaded_job();
    let mut controller = RunController::spawn(MemoryTranscoder::default());

    controller.submit(job.clone()).expect("first submit");
    assert!(matches!(
        controller.submit(job.clone()),
        Err(EditorError::PipelineBusy)
    ));

    let mut terminal = None;
    controller
        .wait(|event| {
            if event.is_terminal() {
                terminal = Some(event);
            }
        })
        .expect("worker should report the run");
    assert!(matches!(terminal, Some(RunEvent::Finished { ref filename, .. }) if *filename == job.output_filename));
    assert!(!controller.is_running());

    controller.submit(job).expect("submit after completion");
}

#[test]
fn worker_reports_failures_as_status_then_failed() {
    let job = loaded_job();
    let mut controller = RunController::spawn(MemoryTranscoder {
        fail_on_exec: Some(1),
        ..MemoryTranscoder::default()
    });
    controller.submit(job).expect("submit");

    let mut events = Vec::new();
    controller
        .wait(|event| events.push(event))
        .expect("worker should report the run");

    let Some(RunEvent::Failed { message }) = events.last() else {
        panic!("expected a failure, got {events:?}");
    };
    assert!(message.starts_with("Something went wrong."));
    assert_eq!(
        events.get(events.len() - 2),
        Some(&RunEvent::Status(message.clone()))
    );
    assert!(!controller.is_running());
}
