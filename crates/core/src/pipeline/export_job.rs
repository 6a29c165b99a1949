use std::path::{Path, PathBuf};

use crate::remux::domain::trim_window::TrimWindow;
use crate::shared::constants::{MAX_SPEED, MIN_SPEED};
use crate::shared::edit_state::EditState;
use crate::shared::error::ExportError;
use crate::shared::rotation::Rotation;

/// Immutable description of one export, validated at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportJob {
    source: PathBuf,
    output: PathBuf,
    window: TrimWindow,
    speed: f64,
    volume: f64,
    rotation: Rotation,
}

impl ExportJob {
    /// Rotation may be any multiple of 90 degrees and is normalized to
    /// 0, 90, 180 or 270.
    pub fn new(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        trim_start_ms: i64,
        trim_end_ms: i64,
        speed: f64,
        volume: f64,
        rotation_degrees: i32,
    ) -> Result<Self, ExportError> {
        let source = source.into();
        let output = output.into();

        if source == output {
            return Err(ExportError::InvalidJob(format!(
                "output must not overwrite the source {}",
                source.display()
            )));
        }
        let window = TrimWindow::new(trim_start_ms, trim_end_ms)?;
        if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(ExportError::InvalidJob(format!(
                "speed must be between {MIN_SPEED} and {MAX_SPEED}, got {speed}"
            )));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(ExportError::InvalidJob(format!(
                "volume must be a finite non-negative factor, got {volume}"
            )));
        }
        let rotation = Rotation::from_degrees(rotation_degrees)?;

        Ok(Self {
            source,
            output,
            window,
            speed,
            volume,
            rotation,
        })
    }

    /// Builds a job from a persisted edit session.
    pub fn from_edit_state(
        state: &EditState,
        output: impl Into<PathBuf>,
    ) -> Result<Self, ExportError> {
        let source = state
            .source
            .clone()
            .ok_or_else(|| ExportError::InvalidJob("edit state has no source video".into()))?;
        Self::new(
            source,
            output,
            state.trim_start_ms,
            state.trim_end_ms,
            state.speed,
            state.volume,
            state.rotation.degrees(),
        )
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn window(&self) -> TrimWindow {
        self.window
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Snapshot of the job's settings for the last-edit store.
    pub fn to_edit_state(&self) -> EditState {
        EditState {
            source: Some(self.source.clone()),
            trim_start_ms: self.window.start_ms(),
            trim_end_ms: self.window.end_ms(),
            speed: self.speed,
            volume: self.volume,
            rotation: self.rotation,
        }
    }
}
