use std::collections::HashMap;

use crate::shared::error::ExportError;

use super::container_writer::TrackHandle;

/// Enforces non-decreasing output timestamps per declared track.
#[derive(Debug, Default)]
pub struct TimestampGuard {
    last: HashMap<TrackHandle, i64>,
}

impl TimestampGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, handle: TrackHandle, timestamp_us: i64) -> Result<(), ExportError> {
        if let Some(&previous_us) = self.last.get(&handle) {
            if timestamp_us < previous_us {
                return Err(ExportError::TimestampOrderViolation {
                    track: handle.id(),
                    previous_us,
                    timestamp_us,
                });
            }
        }
        self.last.insert(handle, timestamp_us);
        Ok(())
    }

    pub fn last(&self, handle: TrackHandle) -> Option<i64> {
        self.last.get(&handle).copied()
    }

    pub fn reset(&mut self) {
        self.last.clear();
    }
}
