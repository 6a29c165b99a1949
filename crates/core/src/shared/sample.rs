/// Per-sample flag bits carried over from the source container.
///
/// Codec configuration travels in the stream parameters, not in samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleFlags {
    pub keyframe: bool,
}

impl SampleFlags {
    pub const KEYFRAME: SampleFlags = SampleFlags { keyframe: true };
}

/// One compressed unit of media pulled from a source track.
///
/// End of stream is signaled by the reader returning no sample rather than
/// by a flag. Rewriters only touch the output timestamp and, for audio
/// gain, the payload bytes.
#[derive(Clone, Debug)]
pub struct Sample {
    track_index: usize,
    data: Vec<u8>,
    source_time_us: i64,
    output_time_us: i64,
    flags: SampleFlags,
}

impl Sample {
    pub fn new(track_index: usize, data: Vec<u8>, source_time_us: i64, flags: SampleFlags) -> Self {
        Self {
            track_index,
            data,
            source_time_us,
            output_time_us: source_time_us,
            flags,
        }
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn source_time_us(&self) -> i64 {
        self.source_time_us
    }

    pub fn output_time_us(&self) -> i64 {
        self.output_time_us
    }

    pub fn set_output_time_us(&mut self, time_us: i64) {
        self.output_time_us = time_us;
    }

    pub fn flags(&self) -> SampleFlags {
        self.flags
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags.keyframe
    }

    /// Builds a substitute sample carrying `payload` at this sample's output time.
    pub fn with_payload(&self, payload: Vec<u8>, flags: SampleFlags) -> Self {
        Self {
            track_index: self.track_index,
            data: payload,
            source_time_us: self.source_time_us,
            output_time_us: self.output_time_us,
            flags,
        }
    }
}
