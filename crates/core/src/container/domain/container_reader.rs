use std::path::Path;

use crate::shared::error::ExportError;
use crate::shared::sample::Sample;
use crate::shared::track::TrackDescriptor;

/// Pull-based access to the compressed samples of a source container.
///
/// Implementations are read-only: payload bytes are returned exactly as
/// stored. One track is active at a time.
pub trait ContainerReader: Send {
    /// Opens the source and describes every audio and video track in it.
    fn open(&mut self, source: &Path) -> Result<Vec<TrackDescriptor>, ExportError>;

    /// Makes `index` the only track whose samples `read_next_sample` returns.
    fn select_track(&mut self, index: usize) -> Result<(), ExportError>;

    /// Moves the cursor to the closest sync sample at or before `time_ms`.
    fn seek(&mut self, time_ms: i64) -> Result<(), ExportError>;

    /// Returns the next sample of the active track in container order, or
    /// `None` at end of stream.
    fn read_next_sample(&mut self) -> Result<Option<Sample>, ExportError>;

    /// Frees all reader resources. Safe to call repeatedly and after errors.
    fn release(&mut self);
}
