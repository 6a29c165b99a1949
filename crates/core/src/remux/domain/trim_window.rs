use crate::shared::constants::MIN_TRIM_DURATION_MS;
use crate::shared::error::ExportError;

/// Where a source timestamp falls relative to the export window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowPosition {
    Before,
    Inside,
    After,
}

/// Inclusive `[start, end]` range of source time to export, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrimWindow {
    start_ms: i64,
    end_ms: i64,
    start_us: i64,
    end_us: i64,
}

impl TrimWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self, ExportError> {
        if start_ms < 0 {
            return Err(ExportError::InvalidJob(format!(
                "trim start must not be negative, got {start_ms}ms"
            )));
        }
        let (Some(start_us), Some(end_us)) = (start_ms.checked_mul(1000), end_ms.checked_mul(1000))
        else {
            return Err(ExportError::InvalidJob(format!(
                "trim window {start_ms}ms-{end_ms}ms is out of range"
            )));
        };
        if end_ms <= start_ms + MIN_TRIM_DURATION_MS {
            return Err(ExportError::InvalidJob(format!(
                "trim end ({end_ms}ms) must be more than {MIN_TRIM_DURATION_MS}ms after trim start ({start_ms}ms)"
            )));
        }
        Ok(Self {
            start_ms,
            end_ms,
            start_us,
            end_us,
        })
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn position(&self, source_time_us: i64) -> WindowPosition {
        if source_time_us < self.start_us {
            WindowPosition::Before
        } else if source_time_us > self.end_us {
            WindowPosition::After
        } else {
            WindowPosition::Inside
        }
    }
}
