use crate::shared::constants::MICROS_PER_SECOND;

/// Uniform output clock that ignores source timestamp jitter.
///
/// The first stamp is 0; each stamp advances the clock by `units` nominal
/// intervals. The clock accumulates in f64 and rounds per stamp so that
/// long exports do not drift.
#[derive(Clone, Debug)]
pub struct SampleRetimer {
    interval_us: f64,
    next_us: f64,
}

impl SampleRetimer {
    pub fn new(interval_us: f64) -> Self {
        Self {
            interval_us,
            next_us: 0.0,
        }
    }

    /// One frame interval divided by speed.
    pub fn for_video(frame_rate: f64, speed: f64) -> Self {
        Self::new(MICROS_PER_SECOND / frame_rate / speed)
    }

    /// One PCM sample interval at the nominal rate, divided by speed.
    pub fn for_audio(sample_rate: u32, speed: f64) -> Self {
        Self::new(MICROS_PER_SECOND / (sample_rate as f64 * speed))
    }

    pub fn interval_us(&self) -> f64 {
        self.interval_us
    }

    /// Returns the current output time and moves the clock `units` intervals on.
    pub fn stamp(&mut self, units: u32) -> i64 {
        let current = self.next_us.round() as i64;
        self.next_us += self.interval_us * units as f64;
        current
    }

    /// Moves the clock `units` intervals on without emitting a stamp.
    pub fn skip(&mut self, units: u32) {
        self.next_us += self.interval_us * units as f64;
    }
}
