use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::container::domain::container_reader::ContainerReader;
use crate::container::domain::container_writer::{ContainerWriter, TrackHandle};
use crate::shared::constants::{DEFAULT_SAMPLE_RATE, PCM_BYTES_PER_SAMPLE};
use crate::shared::error::ExportError;
use crate::shared::sample::Sample;
use crate::shared::track::{TrackDescriptor, TrackFormat};

use super::pcm_gain::apply_gain;
use super::rewrite_stats::RewriteStats;
use super::sample_retimer::SampleRetimer;
use super::trim_window::{TrimWindow, WindowPosition};

/// Copies the trimmed audio samples of one track, retimed to the playback
/// speed and scaled by the volume factor.
///
/// Every in-window sample is kept. Each packet advances the output clock by
/// the number of PCM frames it carries, so consecutive packets stay
/// contiguous at the new speed.
pub struct AudioSampleRewriter {
    window: TrimWindow,
    speed: f64,
    volume: f64,
    cancelled: Arc<AtomicBool>,
}

impl AudioSampleRewriter {
    pub fn new(window: TrimWindow, speed: f64, volume: f64, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            window,
            speed,
            volume,
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

        let sample_rate = track
            .sample_rate()
            .filter(|rate| *rate > 0)
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        let mut retimer = SampleRetimer::for_audio(sample_rate, self.speed);
        let estimated_bytes = self.window.duration_ms() as f64 / 1000.0
            * sample_rate as f64
            * PCM_BYTES_PER_SAMPLE as f64;

        let mut stats = RewriteStats::default();

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(ExportError::Cancelled);
            }

            let Some(mut sample) = reader.read_next_sample()? else {
                break;
            };
            stats.samples_read += 1;

            match self.window.position(sample.source_time_us()) {
                WindowPosition::Before => continue,
                WindowPosition::After => break,
                WindowPosition::Inside => {}
            }

            apply_gain(sample.data_mut(), self.volume);
            let frames = frames_in(&sample, track);
            sample.set_output_time_us(retimer.stamp(frames));

            writer.write_sample(handle, &sample)?;
            stats.record_write(&sample);

            if estimated_bytes > 0.0 {
                on_progress((stats.bytes_written as f64 / estimated_bytes).clamp(0.0, 1.0));
            }
        }

        log::debug!(
            "Audio track {}: read {}, wrote {} ({} bytes)",
            track.index,
            stats.samples_read,
            stats.samples_written,
            stats.bytes_written
        );
        Ok(stats)
    }
}

/// PCM frames carried by one packet: the codec's fixed frame size when the
/// container reports one, otherwise derived from the payload length.
fn frames_in(sample: &Sample, track: &TrackDescriptor) -> u32 {
    match track.format {
        TrackFormat::Audio {
            frames_per_packet: Some(frames),
            ..
        } if frames > 0 => frames,
        TrackFormat::Audio { channels, .. } => {
            let frame_bytes = PCM_BYTES_PER_SAMPLE * channels.max(1) as usize;
            ((sample.len() / frame_bytes) as u32).max(1)
        }
        TrackFormat::Video { .. } => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::domain::test_support::{
        audio_samples, audio_track, pcm_bytes, pcm_values, RecordingWriter, ScriptedReader,
    };
    use crate::shared::track::MediaKind;

    struct Run {
        writer: RecordingWriter,
        result: Result<RewriteStats, ExportError>,
        progress: Vec<f64>,
    }

    fn run(
        track: TrackDescriptor,
        samples: Vec<Sample>,
        window: (i64, i64),
        speed: f64,
        volume: f64,
        writer: RecordingWriter,
        cancelled: Arc<AtomicBool>,
    ) -> Run {
        let mut reader = ScriptedReader::new(vec![track.clone()], samples);
        let mut writer = writer;
        let dir = tempfile::tempdir().unwrap();
        writer.open(&dir.path().join("out.mov")).unwrap();
        let handle = writer.declare_track(&track).unwrap();
        writer.start().unwrap();

        let rewriter = AudioSampleRewriter::new(
            TrimWindow::new(window.0, window.1).unwrap(),
            speed,
            volume,
            cancelled,
        );
        let mut progress = Vec::new();
        let result = rewriter.rewrite(&mut reader, &mut writer, &track, handle, &mut |p| {
            progress.push(p)
        });
        Run {
            writer,
            result,
            progress,
        }
    }

    fn no_cancel() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    /// 100ms packets of 800 mono frames at 8kHz.
    fn tone(count: usize) -> Vec<Sample> {
        let payload = pcm_bytes(&vec![1000i16; 800]);
        audio_samples(0, count, 100_000, &payload)
    }

    #[test]
    fn test_unity_settings_keep_payload_and_spacing() {
        let run = run(
            audio_track(0, 8_000, None),
            tone(30),
            (0, 2000),
            1.0,
            1.0,
            RecordingWriter::new(),
            no_cancel(),
        );

        let stats = run.result.unwrap();
        let written = run.writer.log.lock().unwrap().samples_for(MediaKind::Audio);
        assert_eq!(written.len(), 21);
        assert_eq!(stats.bytes_written, 21 * 1600);
        assert!(written.iter().all(|s| pcm_values(s.data()).iter().all(|&v| v == 1000)));
        let times: Vec<i64> = written.iter().map(|s| s.output_time_us()).collect();
        assert_eq!(&times[..3], &[0, 100_000, 200_000]);
    }

    #[test]
    fn test_trim_discards_packets_outside_window() {
        let run = run(
            audio_track(0, 8_000, None),
            tone(60),
            (1500, 3000),
            1.0,
            1.0,
            RecordingWriter::new(),
            no_cancel(),
        );

        let written = run.writer.log.lock().unwrap().samples_for(MediaKind::Audio);
        assert_eq!(written.first().unwrap().source_time_us(), 1_500_000);
        assert_eq!(written.last().unwrap().source_time_us(), 3_000_000);
        assert_eq!(written[0].output_time_us(), 0);
    }

    #[test]
    fn test_double_speed_halves_packet_spacing() {
        let run = run(
            audio_track(0, 8_000, None),
            tone(20),
            (0, 1500),
            2.0,
            1.0,
            RecordingWriter::new(),
            no_cancel(),
        );

        let written = run.writer.log.lock().unwrap().samples_for(MediaKind::Audio);
        assert_eq!(written.len(), 16);
        assert_eq!(written[1].output_time_us(), 50_000);
        assert_eq!(written[15].output_time_us(), 750_000);
    }

    #[test]
    fn test_codec_frame_size_drives_spacing() {
        let payload = vec![0u8; 371];
        let samples = audio_samples(0, 20, 23_220, &payload);
        let run = run(
            audio_track(0, 44_100, Some(1024)),
            samples,
            (0, 1200),
            1.0,
            1.0,
            RecordingWriter::new(),
            no_cancel(),
        );

        let written = run.writer.log.lock().unwrap().samples_for(MediaKind::Audio);
        assert_eq!(written[1].output_time_us(), 23_220);
        assert_eq!(written[2].output_time_us(), 46_440);
    }

    #[test]
    fn test_volume_scales_amplitude() {
        let run = run(
            audio_track(0, 8_000, None),
            tone(15),
            (0, 1200),
            1.0,
            0.5,
            RecordingWriter::new(),
            no_cancel(),
        );

        let written = run.writer.log.lock().unwrap().samples_for(MediaKind::Audio);
        assert!(written
            .iter()
            .all(|s| pcm_values(s.data()).iter().all(|&v| v == 500)));
    }

    #[test]
    fn test_muted_volume_writes_silence() {
        let run = run(
            audio_track(0, 8_000, None),
            tone(15),
            (0, 1200),
            1.0,
            0.0,
            RecordingWriter::new(),
            no_cancel(),
        );

        let written = run.writer.log.lock().unwrap().samples_for(MediaKind::Audio);
        assert!(written.iter().all(|s| s.data().iter().all(|&b| b == 0)));
    }

    #[test]
    fn test_progress_is_monotonic_and_reaches_one() {
        let run = run(
            audio_track(0, 8_000, None),
            tone(30),
            (0, 2000),
            1.0,
            1.0,
            RecordingWriter::new(),
            no_cancel(),
        );

        assert!(run.progress.windows(2).all(|p| p[1] >= p[0]));
        assert_eq!(run.progress.last().copied(), Some(1.0));
    }

    #[test]
    fn test_write_failure_propagates() {
        let payload = pcm_bytes(&vec![1000i16; 800]);
        let writer = RecordingWriter::new().rejecting_payload(payload);
        let run = run(
            audio_track(0, 8_000, None),
            tone(15),
            (0, 1200),
            1.0,
            1.0,
            writer,
            no_cancel(),
        );

        assert!(matches!(
            run.result,
            Err(ExportError::SampleWriteFailure { .. })
        ));
    }

    #[test]
    fn test_cancellation_is_checked_per_sample() {
        let cancelled = no_cancel();
        let writer = RecordingWriter::new().cancelling_after(3, cancelled.clone());
        let run = run(
            audio_track(0, 8_000, None),
            tone(30),
            (0, 2000),
            1.0,
            1.0,
            writer,
            cancelled,
        );

        assert!(matches!(run.result, Err(ExportError::Cancelled)));
        assert_eq!(run.writer.log.lock().unwrap().written.len(), 3);
    }
}
