use std::path::{Path, PathBuf};

use crate::shared::error::ExportError;

/// Hands a finished export to its final destination.
pub trait PublishSink: Send {
    /// Publishes `file` and returns where the published copy lives.
    /// `on_progress` receives fractions in `[0, 1]`.
    fn publish(
        &mut self,
        file: &Path,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<PathBuf, ExportError>;
}
