//! `clipcrop`: crop, trim and scale a video into a GIF or MP4 through the
//! editor core, printing or running the generated ffmpeg pipeline.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use editor::options::split_off_extension;
use editor::{
    CommandOptions, EditorConfig, FfmpegTranscoder, OptionsEditor, RunController, RunEvent,
    RunJob, VideoModel, VideoProperties, build_commands, pipeline_text,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands, EditArgs, PlanArgs, ProbeArgs, RunArgs, Scale};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Probe(args) => probe(args),
        Commands::Plan(args) => plan(&config, args),
        Commands::Run(args) => run(&config, args),
    }
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let config = EditorConfig::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    debug!(path = %path.display(), "editor config loaded");
    Ok(config)
}

fn probe(args: ProbeArgs) -> Result<()> {
    let properties = VideoProperties::probe(&args.input)
        .with_context(|| format!("failed to probe {}", args.input.display()))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&properties)?);
    } else {
        println!(
            "{}: {}x{}, {}",
            args.input.display(),
            properties.size.width,
            properties.size.height,
            editor::format::format_duration(properties.duration_ms)
        );
    }
    Ok(())
}

/// Applies the requested edit the same way the interactive editor would: the
/// model clamps crop and trim, the options editor derives names and scale.
fn apply_edit(config: &EditorConfig, edit: &EditArgs) -> Result<CommandOptions> {
    let properties = VideoProperties::probe(&edit.input)
        .with_context(|| format!("failed to probe {}", edit.input.display()))?;
    if properties.size.is_empty() || properties.duration_ms == 0 {
        bail!("{} has no usable video stream", edit.input.display());
    }
    let size = properties.size;
    let filename = properties.filename.clone();

    let model = VideoModel::new(config);
    model.set_properties(properties);
    if let Some(crop) = edit.crop {
        model.update_crop(crop.to_ratio_rect(size), false);
        let applied = model.crop().get();
        if applied != crop {
            warn!(requested = ?crop, applied = ?applied, "crop adjusted to fit the frame");
        }
    }
    if let Some(start_ms) = edit.start {
        model.set_start_time_ms(start_ms);
    }
    if let Some(end_ms) = edit.end {
        model.set_end_time_ms(end_ms);
    }

    let mut options = OptionsEditor::new(config);
    options.set_source_filename(filename.as_deref());
    options.set_crop(Some(model.crop().get()));
    options.set_time_range(Some(model.trim().get()));
    if let Some(format) = edit.format {
        options.set_format(format);
    }
    match edit.scale {
        Some(Scale::Percent(percent)) => options.set_scale_percent(percent),
        Some(Scale::Width(width)) => options.set_scale_width(width),
        Some(Scale::Height(height)) => options.set_scale_height(height),
        Some(Scale::Size { width, height }) => {
            options.set_scale_width(width);
            if let Some(scaled) = options.scale_size().filter(|scaled| scaled.height != height) {
                warn!(
                    requested_height = height,
                    height = scaled.height,
                    "scale keeps the crop aspect ratio"
                );
            }
        }
        None => {}
    }
    if let Some(output) = &edit.output {
        let (base, _) = split_off_extension(output);
        options.set_output_base_name(base);
    }

    let snapshot = options.command_options().get();
    info!(
        output = %snapshot.output_filename,
        scale = %options.scale_summary(),
        "edit applied"
    );
    Ok(snapshot)
}

#[derive(Serialize)]
struct Plan<'a> {
    options: &'a CommandOptions,
    commands: Vec<editor::Command>,
}

fn plan(config: &EditorConfig, args: PlanArgs) -> Result<()> {
    let options = apply_edit(config, &args.edit)?;
    let commands = build_commands(&options);
    if args.json {
        let plan = Plan {
            options: &options,
            commands,
        };
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("{}", pipeline_text(&commands));
    }
    Ok(())
}

fn run(config: &EditorConfig, args: RunArgs) -> Result<()> {
    let options = apply_edit(config, &args.edit)?;
    let input_data = std::fs::read(&args.edit.input)
        .with_context(|| format!("failed to read {}", args.edit.input.display()))?;
    let job = RunJob::from_options(&options, input_data);

    let transcoder = FfmpegTranscoder::new().context("failed to prepare transcode workspace")?;
    let mut controller = RunController::spawn(transcoder);
    controller.submit(job)?;

    let mut outcome = None;
    controller.wait(|event| match event {
        RunEvent::Progress(Some(percent)) => {
            eprint!("\rprogress: {percent:5.1}%");
            let _ = std::io::stderr().flush();
        }
        RunEvent::Progress(None) | RunEvent::Status(_) => {}
        terminal => outcome = Some(terminal),
    })?;
    eprintln!();

    match outcome {
        Some(RunEvent::Finished { filename, data }) => {
            let path = args.out_dir.join(&filename);
            std::fs::write(&path, &data)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", path.display());
            Ok(())
        }
        Some(RunEvent::Failed { message }) => bail!(message),
        _ => bail!("pipeline worker stopped without a result"),
    }
}
