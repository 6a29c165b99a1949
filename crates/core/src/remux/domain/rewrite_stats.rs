use crate::shared::sample::Sample;

/// Counters collected while draining one track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub samples_read: usize,
    pub samples_written: usize,
    pub samples_dropped: usize,
    pub keyframe_substitutions: usize,
    pub bytes_written: usize,
    /// Output timestamp of the last written sample.
    pub last_output_time_us: Option<i64>,
}

impl RewriteStats {
    pub(crate) fn record_write(&mut self, sample: &Sample) {
        self.samples_written += 1;
        self.bytes_written += sample.len();
        self.last_output_time_us = Some(sample.output_time_us());
    }
}
