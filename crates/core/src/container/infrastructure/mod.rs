pub mod ffmpeg_container_reader;
pub mod ffmpeg_container_writer;

#[cfg(test)]
pub(crate) mod test_media;
