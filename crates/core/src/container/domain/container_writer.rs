use std::path::Path;

use crate::shared::error::ExportError;
use crate::shared::sample::Sample;
use crate::shared::track::TrackDescriptor;

/// Opaque id for a track declared on a [`ContainerWriter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackHandle(usize);

impl TrackHandle {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn id(self) -> usize {
        self.0
    }
}

/// Appends compressed samples to a new container file.
///
/// Lifecycle: `open` → `declare_track`* → `start` → `write_sample`* →
/// `finish`. `abort` may be called at any point to discard the output.
pub trait ContainerWriter: Send {
    fn open(&mut self, path: &Path) -> Result<(), ExportError>;

    /// Registers an output track. Not allowed once `start` has run.
    fn declare_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackHandle, ExportError>;

    /// Freezes the track table and writes the container header.
    fn start(&mut self) -> Result<(), ExportError>;

    /// Output timestamps must not decrease within a track.
    fn write_sample(&mut self, handle: TrackHandle, sample: &Sample) -> Result<(), ExportError>;

    /// Flushes and closes the container. The partial file is removed if
    /// this fails.
    fn finish(&mut self) -> Result<(), ExportError>;

    /// Releases the writer without finalizing and removes the partial file.
    fn abort(&mut self);
}
