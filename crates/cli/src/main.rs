use std::path::PathBuf;
use std::process;

use clap::Parser;

use vidtrim_core::pipeline::export_job::ExportJob;
use vidtrim_core::pipeline::infrastructure::threaded_export_worker::ThreadedExportWorker;
use vidtrim_core::publishing::infrastructure::directory_publisher::DirectoryPublisher;
use vidtrim_core::publishing::infrastructure::fs_storage_access::FsStorageAccess;
use vidtrim_core::shared::constants::{MAX_SPEED, MIN_SPEED, MIN_TRIM_DURATION_MS};
use vidtrim_core::shared::edit_state::EditState;

/// Trim, retime and re-mux videos without re-encoding.
#[derive(Parser, Debug)]
#[command(name = "vidtrim", allow_negative_numbers = true)]
struct Cli {
    /// Input video file.
    input: PathBuf,

    /// Output file. The container is chosen from its extension.
    output: PathBuf,

    /// Trim start in milliseconds.
    #[arg(long)]
    start_ms: Option<i64>,

    /// Trim end in milliseconds.
    #[arg(long)]
    end_ms: Option<i64>,

    /// Playback speed (0.25-2.0).
    #[arg(long)]
    speed: Option<f64>,

    /// Audio volume multiplier (1.0 = unchanged).
    #[arg(long)]
    volume: Option<f64>,

    /// Clockwise display rotation in degrees (multiple of 90).
    #[arg(long)]
    rotate: Option<i32>,

    /// Copy the finished export into this directory and remove the local file.
    #[arg(long)]
    publish_dir: Option<PathBuf>,

    /// Fill unset options from the last saved edit of this input.
    #[arg(long)]
    resume: bool,

    /// Do not remember this edit for --resume.
    #[arg(long)]
    no_save_state: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let saved = if cli.resume {
        Some(EditState::load())
    } else {
        None
    };
    let job = build_job(&cli, saved.as_ref())?;

    let mut worker = ThreadedExportWorker::new().with_storage_access(Box::new(FsStorageAccess));
    if let Some(dir) = &cli.publish_dir {
        worker = worker.with_publisher(Box::new(DirectoryPublisher::new(dir)));
    }

    let outcome = worker.start(job.clone()).wait_with_progress(|fraction| {
        eprint!("\rExporting... {}%", (fraction * 100.0).round() as u32);
    });
    eprintln!();
    let outcome = outcome?;

    for warning in &outcome.warnings {
        log::warn!("{warning}");
    }
    log::info!(
        "Wrote {} video samples ({} dropped){}",
        outcome.video.samples_written,
        outcome.video.samples_dropped,
        outcome
            .audio
            .as_ref()
            .map(|a| format!(", {} audio samples", a.samples_written))
            .unwrap_or_default()
    );
    log::info!("Output written to {}", outcome.output_path.display());

    if !cli.no_save_state {
        job.to_edit_state().save();
    }
    Ok(())
}

/// Merges explicit flags with the saved edit. The saved edit only applies
/// when it was made on the same input.
fn build_job(cli: &Cli, saved: Option<&EditState>) -> Result<ExportJob, Box<dyn std::error::Error>> {
    let saved = saved.filter(|state| state.matches_source(&cli.input));
    if cli.resume && saved.is_none() {
        log::info!("No saved edit for {}", cli.input.display());
    }

    let start_ms = cli
        .start_ms
        .or(saved.map(|s| s.trim_start_ms))
        .unwrap_or(0);
    let end_ms = cli
        .end_ms
        .or(saved.map(|s| s.trim_end_ms))
        .ok_or("--end-ms is required unless --resume finds a saved edit")?;
    let speed = cli.speed.or(saved.map(|s| s.speed)).unwrap_or(1.0);
    let volume = cli.volume.or(saved.map(|s| s.volume)).unwrap_or(1.0);
    let rotation = cli
        .rotate
        .or(saved.map(|s| s.rotation.degrees()))
        .unwrap_or(0);

    Ok(ExportJob::new(
        &cli.input,
        &cli.output,
        start_ms,
        end_ms,
        speed,
        volume,
        rotation,
    )?)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if cli.input == cli.output {
        return Err("Output must differ from the input".into());
    }
    if let Some(start) = cli.start_ms {
        if start < 0 {
            return Err(format!("Start must not be negative, got {start}").into());
        }
    }
    if let (Some(start), Some(end)) = (cli.start_ms, cli.end_ms) {
        if end - start <= MIN_TRIM_DURATION_MS {
            return Err(format!(
                "Trim window must be longer than {MIN_TRIM_DURATION_MS} ms, got {start}-{end}"
            )
            .into());
        }
    }
    if let Some(speed) = cli.speed {
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(format!(
                "Speed must be between {MIN_SPEED} and {MAX_SPEED}, got {speed}"
            )
            .into());
        }
    }
    if let Some(volume) = cli.volume {
        if !volume.is_finite() || volume < 0.0 {
            return Err(format!("Volume must be zero or positive, got {volume}").into());
        }
    }
    if let Some(degrees) = cli.rotate {
        if degrees % 90 != 0 {
            return Err(format!("Rotation must be a multiple of 90, got {degrees}").into());
        }
    }
    if let Some(dir) = &cli.publish_dir {
        if dir.exists() && !dir.is_dir() {
            return Err(format!("Publish target is not a directory: {}", dir.display()).into());
        }
    }
    Ok(())
}
