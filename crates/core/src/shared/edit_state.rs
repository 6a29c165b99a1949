use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::constants::{APP_CONFIG_DIR, EDIT_STATE_FILENAME};
use crate::shared::rotation::Rotation;

/// The last edit the user configured, persisted between runs.
///
/// The export engine never reads this; front ends use it to restore the
/// previous trim window and adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditState {
    pub source: Option<PathBuf>,
    pub trim_start_ms: i64,
    pub trim_end_ms: i64,
    #[serde(default = "default_factor")]
    pub speed: f64,
    #[serde(default = "default_factor")]
    pub volume: f64,
    #[serde(default)]
    pub rotation: Rotation,
}

fn default_factor() -> f64 {
    1.0
}

impl Default for EditState {
    fn default() -> Self {
        Self {
            source: None,
            trim_start_ms: 0,
            trim_end_ms: 0,
            speed: default_factor(),
            volume: default_factor(),
            rotation: Rotation::None,
        }
    }
}

impl EditState {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_CONFIG_DIR).join(EDIT_STATE_FILENAME))
    }

    /// Loads from the platform config dir, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        Self::default_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) {
        let Some(path) = Self::default_path() else {
            log::warn!("No config directory available; edit state not saved");
            return;
        };
        if let Err(e) = self.save_to(&path) {
            log::warn!("Failed to save edit state to {}: {e}", path.display());
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// True when the stored state refers to `source`.
    pub fn matches_source(&self, source: &Path) -> bool {
        self.source.as_deref() == Some(source)
    }
}
