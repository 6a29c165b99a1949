use std::fs;
use std::path::{Path, PathBuf};

use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::stream::StreamMut;
use ffmpeg_next::{codec, encoder, ffi, Dictionary, Packet, Rational, Rescale};

use crate::container::domain::container_writer::{ContainerWriter, TrackHandle};
use crate::container::domain::timestamp_guard::TimestampGuard;
use crate::shared::error::ExportError;
use crate::shared::rotation::Rotation;
use crate::shared::sample::Sample;
use crate::shared::track::{MediaKind, TrackDescriptor};

use super::ffmpeg_container_reader::MICROSECOND_BASE;

/// Stream-copy muxer built on ffmpeg-next (libavformat).
///
/// Codec parameters are cloned from the source stream named by each
/// descriptor, so payloads are written without re-encoding. The container
/// format is picked from the output file extension.
pub struct FfmpegContainerWriter {
    output_path: Option<PathBuf>,
    octx: Option<Output>,
    tracks: Vec<OutputTrack>,
    guard: TimestampGuard,
    started: bool,
}

struct OutputTrack {
    stream_index: usize,
    kind: MediaKind,
    time_base: Rational,
    last_dts: Option<i64>,
}

// Safety: FfmpegContainerWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegContainerWriter {}

impl FfmpegContainerWriter {
    pub fn new() -> Self {
        Self {
            output_path: None,
            octx: None,
            tracks: Vec::new(),
            guard: TimestampGuard::new(),
            started: false,
        }
    }

    fn unwritable(&self, reason: impl ToString) -> ExportError {
        ExportError::OutputUnwritable {
            path: self.output_path.clone().unwrap_or_default(),
            reason: reason.to_string(),
        }
    }

    fn discard_output(&mut self) {
        self.octx = None;
        if let Some(path) = self.output_path.take() {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("Failed to remove partial output {}: {e}", path.display());
                }
            }
        }
    }
}

impl Default for FfmpegContainerWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerWriter for FfmpegContainerWriter {
    fn open(&mut self, path: &Path) -> Result<(), ExportError> {
        ffmpeg_next::init().map_err(|e| ExportError::OutputUnwritable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let octx = ffmpeg_next::format::output(path).map_err(|e| ExportError::OutputUnwritable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        self.output_path = Some(path.to_path_buf());
        self.octx = Some(octx);
        self.tracks.clear();
        self.guard.reset();
        self.started = false;
        Ok(())
    }

    fn declare_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackHandle, ExportError> {
        if self.started {
            return Err(ExportError::WriterNotReady(
                "tracks cannot be declared after start".into(),
            ));
        }
        let octx = self
            .octx
            .as_mut()
            .ok_or_else(|| ExportError::WriterNotReady("writer not opened".into()))?;

        let kind = descriptor.kind();
        let source = descriptor
            .source_path
            .as_deref()
            .ok_or_else(|| ExportError::UnsupportedTrack {
                kind,
                reason: "no source stream to copy codec parameters from".into(),
            })?;

        let ictx = ffmpeg_next::format::input(source)
            .map_err(|e| ExportError::SourceUnreadable(format!("{}: {e}", source.display())))?;
        let stream = ictx
            .stream(descriptor.index)
            .ok_or(ExportError::TrackNotFound(descriptor.index))?;
        let parameters = stream.parameters();

        // Safety: both pointers are live for the duration of the call.
        let supported = unsafe {
            ffi::avformat_query_codec(octx.format().as_ptr(), parameters.id().into(), 0)
        };
        if supported == 0 {
            return Err(ExportError::UnsupportedTrack {
                kind,
                reason: format!(
                    "{} cannot be stored in a {} container",
                    descriptor.codec,
                    octx.format().name()
                ),
            });
        }

        let mut ost = octx
            .add_stream(encoder::find(codec::Id::None))
            .map_err(|e| ExportError::UnsupportedTrack {
                kind,
                reason: e.to_string(),
            })?;
        ost.set_parameters(parameters);
        unsafe {
            (*ost.parameters().as_mut_ptr()).codec_tag = 0;
        }
        ost.set_time_base(stream.time_base());

        if let Some(rotation) = descriptor.rotation() {
            apply_rotation(&mut ost, rotation);
        }

        self.tracks.push(OutputTrack {
            stream_index: ost.index(),
            kind,
            time_base: stream.time_base(),
            last_dts: None,
        });
        log::debug!(
            "Declared {kind} track {} ({})",
            self.tracks.len() - 1,
            descriptor.codec
        );
        Ok(TrackHandle::new(self.tracks.len() - 1))
    }

    fn start(&mut self) -> Result<(), ExportError> {
        if self.started {
            return Err(ExportError::WriterNotReady("writer already started".into()));
        }
        if self.tracks.is_empty() {
            return Err(ExportError::WriterNotReady("no tracks declared".into()));
        }
        let Some(octx) = self.octx.as_mut() else {
            return Err(ExportError::WriterNotReady("writer not opened".into()));
        };

        if let Err(e) = octx.write_header() {
            return Err(self.unwritable(e));
        }

        // The muxer may replace the requested time bases while writing the header.
        for track in &mut self.tracks {
            if let Some(stream) = octx.stream(track.stream_index) {
                track.time_base = stream.time_base();
            }
        }
        self.started = true;
        Ok(())
    }

    fn write_sample(&mut self, handle: TrackHandle, sample: &Sample) -> Result<(), ExportError> {
        if !self.started {
            return Err(ExportError::WriterNotReady("writer not started".into()));
        }
        let octx = self
            .octx
            .as_mut()
            .ok_or_else(|| ExportError::WriterNotReady("writer already closed".into()))?;
        let track = self
            .tracks
            .get_mut(handle.id())
            .ok_or_else(|| ExportError::WriterNotReady(format!("unknown track {}", handle.id())))?;

        self.guard.check(handle, sample.output_time_us())?;

        // Distinct microsecond stamps can collapse onto one tick of a coarse
        // stream time base; the muxer needs strictly increasing dts.
        let mut ts = sample.output_time_us().rescale(MICROSECOND_BASE, track.time_base);
        if let Some(last) = track.last_dts {
            if ts <= last {
                ts = last + 1;
            }
        }

        let mut packet = Packet::copy(sample.data());
        packet.set_pts(Some(ts));
        packet.set_dts(Some(ts));
        packet.set_position(-1);
        packet.set_stream(track.stream_index);
        if sample.is_keyframe() {
            packet.set_flags(codec::packet::Flags::KEY);
        }

        packet
            .write_interleaved(octx)
            .map_err(|e| ExportError::SampleWriteFailure {
                track: handle.id(),
                reason: format!("{} sample at {}us: {e}", track.kind, sample.output_time_us()),
            })?;
        track.last_dts = Some(ts);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        if !self.started {
            return Err(ExportError::WriterNotReady("writer not started".into()));
        }
        let Some(octx) = self.octx.as_mut() else {
            return Err(ExportError::WriterNotReady("writer already closed".into()));
        };

        if let Err(e) = octx.write_trailer() {
            let err = self.unwritable(e);
            self.discard_output();
            return Err(err);
        }

        self.octx = None;
        self.output_path = None;
        self.started = false;
        Ok(())
    }

    fn abort(&mut self) {
        self.discard_output();
        self.tracks.clear();
        self.started = false;
    }
}

/// Stores the rotation as display-matrix side data and as a `rotate` tag
/// for players that only read metadata.
fn apply_rotation(ost: &mut StreamMut, rotation: Rotation) {
    let matrix = rotation.display_matrix();
    // Safety: the returned buffer is allocated by libavformat with the
    // requested size and owned by the stream.
    unsafe {
        let data = ffi::av_stream_new_side_data(
            ost.as_mut_ptr(),
            ffi::AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX,
            matrix.len(),
        );
        if data.is_null() {
            log::warn!("Could not attach display matrix for {rotation} rotation");
        } else {
            std::ptr::copy_nonoverlapping(matrix.as_ptr(), data, matrix.len());
        }
    }

    if rotation != Rotation::None {
        let mut metadata = Dictionary::new();
        metadata.set("rotate", &rotation.degrees().to_string());
        ost.set_metadata(metadata);
    }
}
