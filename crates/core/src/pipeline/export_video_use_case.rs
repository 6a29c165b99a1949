use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::container::domain::container_reader::ContainerReader;
use crate::container::domain::container_writer::{ContainerWriter, TrackHandle};
use crate::remux::domain::audio_sample_rewriter::AudioSampleRewriter;
use crate::remux::domain::rewrite_stats::RewriteStats;
use crate::remux::domain::video_sample_rewriter::VideoSampleRewriter;
use crate::shared::error::ExportError;
use crate::shared::track::{select_tracks, MediaKind, TrackDescriptor};

use super::export_job::ExportJob;
use super::export_logger::{ExportLogger, NullExportLogger};
use super::progress_tracker::ProgressTracker;

pub type ProgressFn = Box<dyn Fn(f64) + Send>;

/// Lifecycle of one export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Opened,
    TracksDeclared,
    Muxing(MediaKind),
    Finalized,
    Succeeded,
    Failed,
}

/// Non-fatal problems that changed what the output contains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportWarning {
    /// The audio track was refused at declaration; the output has video only.
    AudioDropped { reason: String },
    /// The audio track was refused while muxing. Its samples up to that point
    /// stay in the output.
    AudioTruncated { reason: String },
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportWarning::AudioDropped { reason } => {
                write!(f, "audio track dropped, output is video-only: {reason}")
            }
            ExportWarning::AudioTruncated { reason } => {
                write!(f, "audio track stopped early, output audio is partial: {reason}")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportOutcome {
    pub output_path: PathBuf,
    pub video: RewriteStats,
    pub audio: Option<RewriteStats>,
    pub warnings: Vec<ExportWarning>,
}

/// Trims, retimes and re-muxes a source video into a new container.
///
/// This is a single-use struct: `execute` consumes the owned reader and
/// writer, so calling it twice will fail. Every fatal error aborts the
/// writer, releases the reader and removes the partial output before it is
/// returned.
pub struct ExportVideoUseCase {
    reader: Option<Box<dyn ContainerReader>>,
    writer: Option<Box<dyn ContainerWriter>>,
    logger: Box<dyn ExportLogger>,
    on_progress: Option<ProgressFn>,
    cancelled: Arc<AtomicBool>,
    state: ExportState,
    output_opened: bool,
}

impl ExportVideoUseCase {
    pub fn new(
        reader: Box<dyn ContainerReader>,
        writer: Box<dyn ContainerWriter>,
        logger: Option<Box<dyn ExportLogger>>,
        on_progress: Option<ProgressFn>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
            logger: logger.unwrap_or_else(|| Box::new(NullExportLogger)),
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
            state: ExportState::Idle,
            output_opened: false,
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn execute(&mut self, job: &ExportJob) -> Result<ExportOutcome, ExportError> {
        let (Some(mut reader), Some(mut writer)) = (self.reader.take(), self.writer.take()) else {
            return Err(ExportError::InvalidJob("export already executed".into()));
        };

        match self.run(job, reader.as_mut(), writer.as_mut()) {
            Ok(outcome) => {
                reader.release();
                self.state = ExportState::Succeeded;
                self.logger.summary();
                Ok(outcome)
            }
            Err(err) => {
                writer.abort();
                reader.release();
                if self.output_opened {
                    remove_partial_output(job);
                }
                self.state = ExportState::Failed;
                if err.is_cancelled() {
                    self.logger.info("Export cancelled");
                } else {
                    self.logger.warn(&format!("Export failed: {err}"));
                }
                Err(err)
            }
        }
    }

    fn run(
        &mut self,
        job: &ExportJob,
        reader: &mut dyn ContainerReader,
        writer: &mut dyn ContainerWriter,
    ) -> Result<ExportOutcome, ExportError> {
        self.check_cancelled()?;

        let tracks = reader.open(job.source())?;
        self.state = ExportState::Opened;

        let (video, audio) = select_tracks(&tracks);
        let video = video
            .ok_or(ExportError::NoVideoTrack)?
            .with_rotation(job.rotation());
        let audio = audio.cloned();

        if let Some(parent) = job.output().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ExportError::OutputUnwritable {
                path: job.output().to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        writer.open(job.output())?;
        self.output_opened = true;
        let video_handle = writer.declare_track(&video)?;

        let mut warnings = Vec::new();
        let audio = match audio {
            Some(track) => match writer.declare_track(&track) {
                Ok(handle) => Some((track, handle)),
                Err(err) if err.is_unsupported_audio() => {
                    self.degrade_audio(
                        &mut warnings,
                        ExportWarning::AudioDropped {
                            reason: err.to_string(),
                        },
                    );
                    None
                }
                Err(err) => return Err(err),
            },
            None => None,
        };

        writer.start()?;
        self.state = ExportState::TracksDeclared;
        self.logger.info(&format!(
            "Exporting {} -> {} ({}ms-{}ms, {}x speed, volume {}, {} rotation)",
            job.source().display(),
            job.output().display(),
            job.window().start_ms(),
            job.window().end_ms(),
            job.speed(),
            job.volume(),
            job.rotation()
        ));

        let mut tracker = ProgressTracker::new(audio.is_some());

        self.state = ExportState::Muxing(MediaKind::Video);
        let started = Instant::now();
        let video_stats = self.mux_video(job, reader, writer, &video, video_handle, &mut tracker)?;
        self.logger.timing("video", elapsed_ms(started));

        let mut audio_stats = None;
        if let Some((track, handle)) = audio {
            self.state = ExportState::Muxing(MediaKind::Audio);
            let started = Instant::now();
            match self.mux_audio(job, reader, writer, &track, handle, &mut tracker) {
                Ok(stats) => audio_stats = Some(stats),
                Err(err) if err.is_unsupported_audio() => self.degrade_audio(
                    &mut warnings,
                    ExportWarning::AudioTruncated {
                        reason: err.to_string(),
                    },
                ),
                Err(err) => return Err(err),
            }
            self.logger.timing("audio", elapsed_ms(started));
        }

        self.check_cancelled()?;
        let started = Instant::now();
        writer.finish()?;
        self.logger.timing("finish", elapsed_ms(started));
        self.state = ExportState::Finalized;

        if let Some(value) = tracker.complete() {
            self.report_progress(value);
        }
        self.record_metrics(&video_stats, audio_stats.as_ref());

        Ok(ExportOutcome {
            output_path: job.output().to_path_buf(),
            video: video_stats,
            audio: audio_stats,
            warnings,
        })
    }

    fn mux_video(
        &mut self,
        job: &ExportJob,
        reader: &mut dyn ContainerReader,
        writer: &mut dyn ContainerWriter,
        track: &TrackDescriptor,
        handle: TrackHandle,
        tracker: &mut ProgressTracker,
    ) -> Result<RewriteStats, ExportError> {
        let rewriter = VideoSampleRewriter::new(job.window(), job.speed(), self.cancelled.clone());
        rewriter.rewrite(reader, writer, track, handle, &mut |fraction| {
            if let Some(value) = tracker.update_video(fraction) {
                self.report_progress(value);
            }
        })
    }

    fn mux_audio(
        &mut self,
        job: &ExportJob,
        reader: &mut dyn ContainerReader,
        writer: &mut dyn ContainerWriter,
        track: &TrackDescriptor,
        handle: TrackHandle,
        tracker: &mut ProgressTracker,
    ) -> Result<RewriteStats, ExportError> {
        let rewriter = AudioSampleRewriter::new(
            job.window(),
            job.speed(),
            job.volume(),
            self.cancelled.clone(),
        );
        rewriter.rewrite(reader, writer, track, handle, &mut |fraction| {
            if let Some(value) = tracker.update_audio(fraction) {
                self.report_progress(value);
            }
        })
    }

    fn report_progress(&mut self, value: f64) {
        self.logger.progress(value);
        if let Some(callback) = &self.on_progress {
            callback(value);
        }
    }

    fn degrade_audio(&mut self, warnings: &mut Vec<ExportWarning>, warning: ExportWarning) {
        self.logger.warn(&warning.to_string());
        warnings.push(warning);
    }

    fn record_metrics(&mut self, video: &RewriteStats, audio: Option<&RewriteStats>) {
        self.logger
            .metric("video_samples_written", video.samples_written as f64);
        self.logger
            .metric("video_samples_dropped", video.samples_dropped as f64);
        if video.keyframe_substitutions > 0 {
            self.logger.metric(
                "video_keyframe_substitutions",
                video.keyframe_substitutions as f64,
            );
        }
        if let Some(audio) = audio {
            self.logger
                .metric("audio_samples_written", audio.samples_written as f64);
            self.logger
                .metric("audio_bytes_written", audio.bytes_written as f64);
        }
    }

    fn check_cancelled(&self) -> Result<(), ExportError> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn remove_partial_output(job: &ExportJob) {
    let path = job.output();
    if path.is_file() {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Failed to remove partial output {}: {e}", path.display());
        }
    }
}
