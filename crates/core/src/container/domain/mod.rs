pub mod container_reader;
pub mod container_writer;
pub mod timestamp_guard;

#[cfg(test)]
pub(crate) mod test_support;
