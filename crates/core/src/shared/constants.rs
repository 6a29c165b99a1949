/// Shortest allowed export window.
pub const MIN_TRIM_DURATION_MS: i64 = 1000;

pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 2.0;

/// Fallbacks for containers that omit track format keys.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_CHANNEL_COUNT: u16 = 2;

/// Share of overall progress owned by the video track when audio is present.
pub const VIDEO_PROGRESS_WEIGHT: f64 = 0.7;
pub const AUDIO_PROGRESS_WEIGHT: f64 = 0.3;

/// Share of worker progress owned by the export when a publish step follows.
pub const EXPORT_PROGRESS_SHARE: f64 = 0.8;

pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Bytes per PCM sample assumed by audio gain and progress estimates.
pub const PCM_BYTES_PER_SAMPLE: usize = 2;

pub const PUBLISH_CHUNK_SIZE: usize = 8 * 1024;

pub const APP_CONFIG_DIR: &str = "Vidtrim";
pub const EDIT_STATE_FILENAME: &str = "last_edit.json";
