use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::container::domain::container_reader::ContainerReader;
use crate::container::domain::container_writer::{ContainerWriter, TrackHandle};
use crate::shared::constants::DEFAULT_FRAME_RATE;
use crate::shared::error::ExportError;
use crate::shared::sample::{Sample, SampleFlags};
use crate::shared::track::TrackDescriptor;

use super::frame_drop_policy::FrameDropPolicy;
use super::rewrite_stats::RewriteStats;
use super::sample_retimer::SampleRetimer;
use super::trim_window::{TrimWindow, WindowPosition};

/// Copies the trimmed, retimed video samples of one track into the writer.
///
/// Samples are never decoded. Speed-ups above 1x thin out non-keyframes
/// via [`FrameDropPolicy`]. Every in-window source frame owns one slot of
/// `frame interval / speed` on a [`SampleRetimer`] clock starting at 0, and
/// kept frames are stamped at their slot, so the track lasts
/// `window / speed` whether or not frames are dropped.
pub struct VideoSampleRewriter {
    window: TrimWindow,
    speed: f64,
    cancelled: Arc<AtomicBool>,
}

impl VideoSampleRewriter {
    pub fn new(window: TrimWindow, speed: f64, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            window,
            speed,
            cancelled,
        }
    }

    pub fn rewrite(
        &self,
        reader: &mut dyn ContainerReader,
        writer: &mut dyn ContainerWriter,
        track: &TrackDescriptor,
        handle: TrackHandle,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<RewriteStats, ExportError> {
        reader.select_track(track.index)?;
        reader.seek(self.window.start_ms())?;

        let frame_rate = track
            .frame_rate()
            .filter(|fps| *fps > 0.0)
            .unwrap_or(DEFAULT_FRAME_RATE);
        let policy = FrameDropPolicy::for_speed(self.speed);
        let mut retimer = SampleRetimer::for_video(frame_rate, self.speed);
        let estimated = self.window.duration_ms() as f64 / 1000.0 * frame_rate;

        let mut stats = RewriteStats::default();
        let mut ordinal = 0usize;
        let mut last_keyframe: Option<Vec<u8>> = None;

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(ExportError::Cancelled);
            }

            let Some(mut sample) = reader.read_next_sample()? else {
                break;
            };
            stats.samples_read += 1;

            if sample.is_keyframe() {
                last_keyframe = Some(sample.data().to_vec());
            }

            match self.window.position(sample.source_time_us()) {
                WindowPosition::Before => continue,
                WindowPosition::After => break,
                WindowPosition::Inside => {}
            }

            let index = ordinal;
            ordinal += 1;

            if policy.keeps(index, sample.is_keyframe()) {
                sample.set_output_time_us(retimer.stamp(1));
                write_with_fallback(
                    writer,
                    handle,
                    &sample,
                    last_keyframe.as_deref(),
                    &mut stats,
                )?;
            } else {
                retimer.skip(1);
                stats.samples_dropped += 1;
            }

            if estimated > 0.0 {
                on_progress((ordinal as f64 / estimated).clamp(0.0, 1.0));
            }
        }

        log::debug!(
            "Video track {}: read {}, wrote {}, dropped {}",
            track.index,
            stats.samples_read,
            stats.samples_written,
            stats.samples_dropped
        );
        Ok(stats)
    }
}

/// Writes `sample`; if a non-keyframe is rejected, writes the most recent
/// keyframe payload at the same timestamp instead. At most one retry.
fn write_with_fallback(
    writer: &mut dyn ContainerWriter,
    handle: TrackHandle,
    sample: &Sample,
    last_keyframe: Option<&[u8]>,
    stats: &mut RewriteStats,
) -> Result<(), ExportError> {
    match writer.write_sample(handle, sample) {
        Ok(()) => {
            stats.record_write(sample);
            Ok(())
        }
        Err(err @ ExportError::SampleWriteFailure { .. }) if !sample.is_keyframe() => {
            let Some(keyframe) = last_keyframe else {
                return Err(err);
            };
            log::warn!(
                "Substituting last keyframe at {}us: {err}",
                sample.output_time_us()
            );
            let substitute = sample.with_payload(keyframe.to_vec(), SampleFlags::KEYFRAME);
            writer.write_sample(handle, &substitute)?;
            stats.keyframe_substitutions += 1;
            stats.record_write(&substitute);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
