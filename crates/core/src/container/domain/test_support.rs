//! Scripted in-memory reader and recording writer shared by the remux and
//! pipeline tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::shared::error::ExportError;
use crate::shared::rotation::Rotation;
use crate::shared::sample::{Sample, SampleFlags};
use crate::shared::track::{MediaKind, TrackDescriptor, TrackFormat};

use super::container_reader::ContainerReader;
use super::container_writer::{ContainerWriter, TrackHandle};
use super::timestamp_guard::TimestampGuard;

// --- Builders ---

pub(crate) fn video_track(index: usize, frame_rate: f64) -> TrackDescriptor {
    TrackDescriptor {
        index,
        codec: "h264".to_string(),
        format: TrackFormat::Video {
            width: 320,
            height: 240,
            frame_rate,
            rotation: Rotation::None,
        },
        source_path: None,
    }
}

pub(crate) fn audio_track(
    index: usize,
    sample_rate: u32,
    frames_per_packet: Option<u32>,
) -> TrackDescriptor {
    TrackDescriptor {
        index,
        codec: "pcm_s16le".to_string(),
        format: TrackFormat::Audio {
            sample_rate,
            channels: 1,
            frames_per_packet,
        },
        source_path: None,
    }
}

/// `count` frames at `fps` with a keyframe every `gop` frames. Each payload
/// encodes its frame number so tests can tell frames apart.
pub(crate) fn video_samples(track: usize, count: usize, fps: f64, gop: usize) -> Vec<Sample> {
    (0..count)
        .map(|i| {
            let time_us = (i as f64 * 1_000_000.0 / fps).round() as i64;
            let flags = if i % gop == 0 {
                SampleFlags::KEYFRAME
            } else {
                SampleFlags::default()
            };
            Sample::new(track, (i as u32).to_le_bytes().to_vec(), time_us, flags)
        })
        .collect()
}

/// `count` audio packets `spacing_us` apart, each carrying `payload`.
pub(crate) fn audio_samples(
    track: usize,
    count: usize,
    spacing_us: i64,
    payload: &[u8],
) -> Vec<Sample> {
    (0..count)
        .map(|i| {
            Sample::new(
                track,
                payload.to_vec(),
                i as i64 * spacing_us,
                SampleFlags::KEYFRAME,
            )
        })
        .collect()
}

pub(crate) fn pcm_bytes(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn pcm_values(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

// --- Reader ---

pub(crate) struct ScriptedReader {
    tracks: Vec<TrackDescriptor>,
    samples: HashMap<usize, Vec<Sample>>,
    selected: Option<usize>,
    cursor: usize,
    fail_open: bool,
    pub released: Arc<AtomicUsize>,
    pub seeks: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedReader {
    pub fn new(tracks: Vec<TrackDescriptor>, samples: Vec<Sample>) -> Self {
        let mut by_track: HashMap<usize, Vec<Sample>> = HashMap::new();
        for sample in samples {
            by_track.entry(sample.track_index()).or_default().push(sample);
        }
        Self {
            tracks,
            samples: by_track,
            selected: None,
            cursor: 0,
            fail_open: false,
            released: Arc::new(AtomicUsize::new(0)),
            seeks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unreadable() -> Self {
        let mut reader = Self::new(Vec::new(), Vec::new());
        reader.fail_open = true;
        reader
    }

    fn active(&self) -> &[Sample] {
        self.selected
            .and_then(|i| self.samples.get(&i))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

impl ContainerReader for ScriptedReader {
    fn open(&mut self, _source: &Path) -> Result<Vec<TrackDescriptor>, ExportError> {
        if self.fail_open {
            return Err(ExportError::SourceUnreadable("scripted failure".into()));
        }
        Ok(self.tracks.clone())
    }

    fn select_track(&mut self, index: usize) -> Result<(), ExportError> {
        if !self.tracks.iter().any(|t| t.index == index) {
            return Err(ExportError::TrackNotFound(index));
        }
        self.selected = Some(index);
        self.cursor = 0;
        Ok(())
    }

    fn seek(&mut self, time_ms: i64) -> Result<(), ExportError> {
        self.seeks.lock().unwrap().push(time_ms);
        let target_us = time_ms * 1000;
        self.cursor = self
            .active()
            .iter()
            .rposition(|s| s.is_keyframe() && s.source_time_us() <= target_us)
            .unwrap_or(0);
        Ok(())
    }

    fn read_next_sample(&mut self) -> Result<Option<Sample>, ExportError> {
        let sample = self.active().get(self.cursor).cloned();
        if sample.is_some() {
            self.cursor += 1;
        }
        Ok(sample)
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.selected = None;
    }
}

// --- Writer ---

#[derive(Default)]
pub(crate) struct WriterLog {
    pub declared: Vec<TrackDescriptor>,
    pub written: Vec<(TrackHandle, Sample)>,
    pub started: bool,
    pub finished: bool,
    pub aborted: usize,
}

impl WriterLog {
    pub fn samples_for(&self, kind: MediaKind) -> Vec<Sample> {
        self.written
            .iter()
            .filter(|(h, _)| self.declared[h.id()].kind() == kind)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

pub(crate) struct RecordingWriter {
    pub log: Arc<Mutex<WriterLog>>,
    path: Option<PathBuf>,
    guard: TimestampGuard,
    unsupported: Vec<MediaKind>,
    rejected_payloads: Vec<Vec<u8>>,
    fail_open: bool,
    fail_finish: bool,
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(WriterLog::default())),
            path: None,
            guard: TimestampGuard::new(),
            unsupported: Vec::new(),
            rejected_payloads: Vec::new(),
            fail_open: false,
            fail_finish: false,
            cancel_after: None,
        }
    }

    pub fn rejecting_kind(mut self, kind: MediaKind) -> Self {
        self.unsupported.push(kind);
        self
    }

    /// Any write whose payload equals `payload` fails.
    pub fn rejecting_payload(mut self, payload: Vec<u8>) -> Self {
        self.rejected_payloads.push(payload);
        self
    }

    /// `open` fails without creating anything at the path.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    /// Raises `flag` once `writes` samples have been written.
    pub fn cancelling_after(mut self, writes: usize, flag: Arc<AtomicBool>) -> Self {
        self.cancel_after = Some((writes, flag));
        self
    }

    fn remove_output(&self) {
        if let Some(path) = &self.path {
            let _ = fs::remove_file(path);
        }
    }
}

impl ContainerWriter for RecordingWriter {
    fn open(&mut self, path: &Path) -> Result<(), ExportError> {
        if self.fail_open {
            return Err(ExportError::OutputUnwritable {
                path: path.to_path_buf(),
                reason: "scripted muxer lookup failure".into(),
            });
        }
        fs::write(path, b"partial").map_err(|e| ExportError::io(path, e))?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn declare_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackHandle, ExportError> {
        let mut log = self.log.lock().unwrap();
        if log.started {
            return Err(ExportError::WriterNotReady("already started".into()));
        }
        if self.unsupported.contains(&descriptor.kind()) {
            return Err(ExportError::UnsupportedTrack {
                kind: descriptor.kind(),
                reason: "scripted rejection".into(),
            });
        }
        log.declared.push(descriptor.clone());
        Ok(TrackHandle::new(log.declared.len() - 1))
    }

    fn start(&mut self) -> Result<(), ExportError> {
        let mut log = self.log.lock().unwrap();
        if log.declared.is_empty() {
            return Err(ExportError::WriterNotReady("no tracks declared".into()));
        }
        log.started = true;
        Ok(())
    }

    fn write_sample(&mut self, handle: TrackHandle, sample: &Sample) -> Result<(), ExportError> {
        self.guard.check(handle, sample.output_time_us())?;
        if self.rejected_payloads.iter().any(|p| p == sample.data()) {
            return Err(ExportError::SampleWriteFailure {
                track: handle.id(),
                reason: "scripted rejection".into(),
            });
        }
        let mut log = self.log.lock().unwrap();
        log.written.push((handle, sample.clone()));
        if let Some((writes, flag)) = &self.cancel_after {
            if log.written.len() >= *writes {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        if self.fail_finish {
            self.remove_output();
            return Err(ExportError::OutputUnwritable {
                path: self.path.clone().unwrap_or_default(),
                reason: "scripted trailer failure".into(),
            });
        }
        self.log.lock().unwrap().finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.log.lock().unwrap().aborted += 1;
        self.remove_output();
    }
}
