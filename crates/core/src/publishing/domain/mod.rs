pub mod publish_sink;
pub mod storage_access;
