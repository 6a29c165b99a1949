use std::path::{Path, PathBuf};

use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::{media, Rational, Rescale};

use crate::container::domain::container_reader::ContainerReader;
use crate::shared::constants::{DEFAULT_CHANNEL_COUNT, DEFAULT_FRAME_RATE, DEFAULT_SAMPLE_RATE};
use crate::shared::error::ExportError;
use crate::shared::rotation::Rotation;
use crate::shared::sample::{Sample, SampleFlags};
use crate::shared::track::{TrackDescriptor, TrackFormat};

pub(crate) const MICROSECOND_BASE: Rational = Rational(1, 1_000_000);

/// Demuxes compressed samples via ffmpeg-next (libavformat) without
/// decoding them.
pub struct FfmpegContainerReader {
    input_ctx: Option<Input>,
    source_path: Option<PathBuf>,
    tracks: Vec<TrackDescriptor>,
    active: Option<ActiveTrack>,
}

#[derive(Clone, Copy)]
struct ActiveTrack {
    index: usize,
    time_base: Rational,
}

// Safety: FfmpegContainerReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegContainerReader {}

impl FfmpegContainerReader {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            source_path: None,
            tracks: Vec::new(),
            active: None,
        }
    }

    fn reopen(&mut self) -> Result<(), ExportError> {
        let path = self
            .source_path
            .clone()
            .ok_or_else(|| ExportError::SourceUnreadable("reader not opened".into()))?;
        let ictx = ffmpeg_next::format::input(&path)
            .map_err(|e| ExportError::SourceUnreadable(format!("{}: {e}", path.display())))?;
        self.input_ctx = Some(ictx);
        Ok(())
    }
}

impl Default for FfmpegContainerReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerReader for FfmpegContainerReader {
    fn open(&mut self, source: &Path) -> Result<Vec<TrackDescriptor>, ExportError> {
        ffmpeg_next::init().map_err(|e| ExportError::SourceUnreadable(e.to_string()))?;

        let ictx = ffmpeg_next::format::input(source)
            .map_err(|e| ExportError::SourceUnreadable(format!("{}: {e}", source.display())))?;

        let tracks: Vec<TrackDescriptor> = ictx
            .streams()
            .filter_map(|stream| describe_stream(&stream, source))
            .collect();

        log::debug!(
            "Opened {} with {} usable track(s)",
            source.display(),
            tracks.len()
        );

        self.tracks = tracks.clone();
        self.source_path = Some(source.to_path_buf());
        self.input_ctx = Some(ictx);
        self.active = None;
        Ok(tracks)
    }

    fn select_track(&mut self, index: usize) -> Result<(), ExportError> {
        let ictx = self
            .input_ctx
            .as_ref()
            .ok_or_else(|| ExportError::SourceUnreadable("reader not opened".into()))?;
        if !self.tracks.iter().any(|t| t.index == index) {
            return Err(ExportError::TrackNotFound(index));
        }
        let stream = ictx.stream(index).ok_or(ExportError::TrackNotFound(index))?;
        self.active = Some(ActiveTrack {
            index,
            time_base: stream.time_base(),
        });
        Ok(())
    }

    fn seek(&mut self, time_ms: i64) -> Result<(), ExportError> {
        let ictx = self
            .input_ctx
            .as_mut()
            .ok_or_else(|| ExportError::SourceUnreadable("reader not opened".into()))?;

        let target_us = time_ms.max(0).saturating_mul(1000);
        match ictx.seek(target_us, ..target_us) {
            Ok(()) => Ok(()),
            // Some demuxers refuse to seek to the very start; a fresh
            // context is already positioned there.
            Err(e) if target_us == 0 => {
                log::debug!("Seek to start refused ({e}), reopening source");
                self.reopen()
            }
            Err(e) => Err(ExportError::SourceUnreadable(format!(
                "seek to {time_ms}ms failed: {e}"
            ))),
        }
    }

    fn read_next_sample(&mut self) -> Result<Option<Sample>, ExportError> {
        let active = self
            .active
            .ok_or_else(|| ExportError::SourceUnreadable("no track selected".into()))?;
        let ictx = self
            .input_ctx
            .as_mut()
            .ok_or_else(|| ExportError::SourceUnreadable("reader not opened".into()))?;

        loop {
            let Some((stream, packet)) = ictx.packets().next() else {
                return Ok(None);
            };
            if stream.index() != active.index {
                continue;
            }

            let timestamp = packet.pts().or(packet.dts()).unwrap_or(0);
            let time_us = timestamp.rescale(active.time_base, MICROSECOND_BASE);
            let flags = SampleFlags {
                keyframe: packet.is_key(),
            };
            let data = packet.data().map(|d| d.to_vec()).unwrap_or_default();

            return Ok(Some(Sample::new(active.index, data, time_us, flags)));
        }
    }

    fn release(&mut self) {
        self.input_ctx = None;
        self.active = None;
        self.tracks.clear();
    }
}

/// Builds a descriptor for audio and video streams; other media types are
/// skipped.
fn describe_stream(stream: &Stream, source: &Path) -> Option<TrackDescriptor> {
    let params = stream.parameters();
    let codec = params.id().name().to_string();

    let format = match params.medium() {
        media::Type::Video => {
            // Safety: params wraps a live AVCodecParameters owned by the input context.
            let (width, height) = unsafe {
                let raw = params.as_ptr();
                ((*raw).width.max(0) as u32, (*raw).height.max(0) as u32)
            };
            TrackFormat::Video {
                width,
                height,
                frame_rate: frame_rate(stream),
                rotation: extract_rotation(stream),
            }
        }
        media::Type::Audio => {
            let (sample_rate, channels, frame_size) = unsafe {
                let raw = params.as_ptr();
                (
                    (*raw).sample_rate,
                    (*raw).ch_layout.nb_channels,
                    (*raw).frame_size,
                )
            };
            // Raw PCM packets vary in length; their frame count comes from
            // the payload size instead.
            let frames_per_packet =
                (frame_size > 0 && !codec.starts_with("pcm_")).then_some(frame_size as u32);
            TrackFormat::Audio {
                sample_rate: if sample_rate > 0 {
                    sample_rate as u32
                } else {
                    DEFAULT_SAMPLE_RATE
                },
                channels: if channels > 0 {
                    channels as u16
                } else {
                    DEFAULT_CHANNEL_COUNT
                },
                frames_per_packet,
            }
        }
        _ => return None,
    };

    Some(TrackDescriptor {
        index: stream.index(),
        codec,
        format,
        source_path: Some(source.to_path_buf()),
    })
}

/// Average frame rate, then the real base rate, then the default.
fn frame_rate(stream: &Stream) -> f64 {
    [stream.avg_frame_rate(), stream.rate()]
        .into_iter()
        .find_map(rational_to_fps)
        .unwrap_or(DEFAULT_FRAME_RATE)
}

fn rational_to_fps(rate: Rational) -> Option<f64> {
    (rate.numerator() > 0 && rate.denominator() > 0)
        .then(|| rate.numerator() as f64 / rate.denominator() as f64)
}

/// Tries stream side data (DisplayMatrix) first, then falls back to the
/// `"rotate"` metadata tag.
fn extract_rotation(stream: &Stream) -> Rotation {
    for side_data in stream.side_data() {
        if side_data.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix {
            if let Some(rotation) = Rotation::from_display_matrix(side_data.data()) {
                return rotation;
            }
        }
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|value| value.trim().parse::<i32>().ok())
        .map(Rotation::nearest)
        .unwrap_or_default()
}
