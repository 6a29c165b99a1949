use std::fs;
use std::path::Path;

use crate::publishing::domain::storage_access::StorageAccess;

/// Checks write access on the local filesystem.
///
/// A directory that does not exist yet is judged by its nearest existing
/// ancestor, since the export creates missing parents.
pub struct FsStorageAccess;

impl StorageAccess for FsStorageAccess {
    fn can_write(&self, dir: &Path) -> bool {
        let Some(existing) = dir.ancestors().find(|p| p.exists()) else {
            return false;
        };
        match fs::metadata(existing) {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(e) => {
                log::debug!("Cannot inspect {}: {e}", existing.display());
                false
            }
        }
    }
}
