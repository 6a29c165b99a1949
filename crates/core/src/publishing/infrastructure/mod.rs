pub mod directory_publisher;
pub mod fs_storage_access;
