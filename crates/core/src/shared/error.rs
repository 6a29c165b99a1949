use std::path::PathBuf;

use thiserror::Error;

use crate::shared::track::MediaKind;

/// Every way an export job can fail.
///
/// All variants except `UnsupportedTrack` on the audio track are fatal to
/// the job; the orchestrator releases resources and removes partial output
/// before returning any of them.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("invalid export job: {0}")]
    InvalidJob(String),
    #[error("source unreadable: {0}")]
    SourceUnreadable(String),
    #[error("source has no video track")]
    NoVideoTrack,
    #[error("track {0} not found in source")]
    TrackNotFound(usize),
    #[error("unsupported {kind} track: {reason}")]
    UnsupportedTrack { kind: MediaKind, reason: String },
    #[error("cannot create output {path}: {reason}")]
    OutputUnwritable { path: PathBuf, reason: String },
    #[error("writer not ready: {0}")]
    WriterNotReady(String),
    #[error("timestamp order violation on track {track}: {timestamp_us}us after {previous_us}us")]
    TimestampOrderViolation {
        track: usize,
        previous_us: i64,
        timestamp_us: i64,
    },
    #[error("sample write failed on track {track}: {reason}")]
    SampleWriteFailure { track: usize, reason: String },
    #[error("export cancelled")]
    Cancelled,
    #[error("no write access to {0}")]
    PermissionDenied(PathBuf),
    #[error("export worker stopped without a result")]
    WorkerStopped,
    #[error("failed to publish {path}: {reason}")]
    PublishFailed { path: PathBuf, reason: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for the one failure the orchestrator downgrades to a warning.
    pub fn is_unsupported_audio(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedTrack {
                kind: MediaKind::Audio,
                ..
            }
        )
    }
}
