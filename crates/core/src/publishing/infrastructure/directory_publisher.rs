use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::publishing::domain::publish_sink::PublishSink;
use crate::shared::constants::PUBLISH_CHUNK_SIZE;
use crate::shared::error::ExportError;

/// Copies finished exports into a target directory, never overwriting an
/// existing file.
///
/// The copy is streamed in 8 KiB chunks to a `.part` file that is renamed
/// into place once complete.
pub struct DirectoryPublisher {
    target_dir: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// `name.ext`, then `name (1).ext`, `name (2).ext`, ...
    fn unique_destination(&self, file: &Path) -> Result<PathBuf, ExportError> {
        let file_name = file.file_name().ok_or_else(|| ExportError::PublishFailed {
            path: file.to_path_buf(),
            reason: "not a file path".into(),
        })?;
        let candidate = self.target_dir.join(file_name);
        if !candidate.exists() {
            return Ok(candidate);
        }

        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = file
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (1..)
            .map(|n| self.target_dir.join(format!("{stem} ({n}){extension}")))
            .find(|p| !p.exists())
            .ok_or_else(|| ExportError::PublishFailed {
                path: file.to_path_buf(),
                reason: "no free destination name".into(),
            })
    }
}

impl PublishSink for DirectoryPublisher {
    fn publish(
        &mut self,
        file: &Path,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<PathBuf, ExportError> {
        let failed = |reason: String| ExportError::PublishFailed {
            path: file.to_path_buf(),
            reason,
        };

        fs::create_dir_all(&self.target_dir)
            .map_err(|e| failed(format!("cannot create {}: {e}", self.target_dir.display())))?;

        let destination = self.unique_destination(file)?;
        let temp_path = destination.with_extension("part");

        let copied = copy_in_chunks(file, &temp_path, on_progress).and_then(|()| {
            fs::rename(&temp_path, &destination).map_err(|e| ExportError::io(&destination, e))
        });
        if let Err(e) = copied {
            let _ = fs::remove_file(&temp_path);
            return Err(failed(e.to_string()));
        }

        log::info!("Published {} to {}", file.display(), destination.display());
        Ok(destination)
    }
}

fn copy_in_chunks(
    source: &Path,
    dest: &Path,
    on_progress: &mut dyn FnMut(f64),
) -> Result<(), ExportError> {
    let mut input = File::open(source).map_err(|e| ExportError::io(source, e))?;
    let total = input
        .metadata()
        .map_err(|e| ExportError::io(source, e))?
        .len();
    let mut output = File::create(dest).map_err(|e| ExportError::io(dest, e))?;

    let mut buffer = vec![0u8; PUBLISH_CHUNK_SIZE];
    let mut copied: u64 = 0;
    loop {
        let read = input
            .read(&mut buffer)
            .map_err(|e| ExportError::io(source, e))?;
        if read == 0 {
            break;
        }
        output
            .write_all(&buffer[..read])
            .map_err(|e| ExportError::io(dest, e))?;
        copied += read as u64;
        if total > 0 {
            on_progress((copied as f64 / total as f64).min(1.0));
        }
    }

    output.flush().map_err(|e| ExportError::io(dest, e))?;
    on_progress(1.0);
    Ok(())
}
