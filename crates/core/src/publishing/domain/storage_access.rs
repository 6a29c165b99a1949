use std::path::Path;

/// Answers whether the process may create files in a directory.
pub trait StorageAccess: Send {
    fn can_write(&self, dir: &Path) -> bool;
}
