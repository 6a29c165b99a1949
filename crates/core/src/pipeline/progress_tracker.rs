use crate::shared::constants::{AUDIO_PROGRESS_WEIGHT, VIDEO_PROGRESS_WEIGHT};

/// Combines per-track progress into one non-decreasing fraction.
///
/// Video owns 70% and audio 30% of the range when the export has an audio
/// track; otherwise video owns all of it.
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    video_weight: f64,
    audio_weight: f64,
    video: f64,
    audio: f64,
    reported: f64,
}

impl ProgressTracker {
    pub fn new(has_audio: bool) -> Self {
        let (video_weight, audio_weight) = if has_audio {
            (VIDEO_PROGRESS_WEIGHT, AUDIO_PROGRESS_WEIGHT)
        } else {
            (1.0, 0.0)
        };
        Self {
            video_weight,
            audio_weight,
            video: 0.0,
            audio: 0.0,
            reported: 0.0,
        }
    }

    pub fn current(&self) -> f64 {
        self.reported
    }

    /// Returns the new overall value when it moved forward.
    pub fn update_video(&mut self, fraction: f64) -> Option<f64> {
        self.video = fraction.clamp(0.0, 1.0);
        self.advance()
    }

    pub fn update_audio(&mut self, fraction: f64) -> Option<f64> {
        self.audio = fraction.clamp(0.0, 1.0);
        self.advance()
    }

    pub fn complete(&mut self) -> Option<f64> {
        self.video = 1.0;
        self.audio = 1.0;
        self.advance()
    }

    fn advance(&mut self) -> Option<f64> {
        let combined =
            (self.video * self.video_weight + self.audio * self.audio_weight).clamp(0.0, 1.0);
        if combined > self.reported {
            self.reported = combined;
            Some(combined)
        } else {
            None
        }
    }
}
