use std::path::PathBuf;

use crate::shared::rotation::Rotation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrackFormat {
    Video {
        width: u32,
        height: u32,
        frame_rate: f64,
        rotation: Rotation,
    },
    Audio {
        sample_rate: u32,
        channels: u16,
        /// PCM frames carried by each packet, when the codec fixes it.
        frames_per_packet: Option<u32>,
    },
}

/// Format metadata for one source track, read once when the source opens.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackDescriptor {
    pub index: usize,
    pub codec: String,
    pub format: TrackFormat,
    /// Lets a stream-copy writer clone the source codec parameters.
    pub source_path: Option<PathBuf>,
}

impl TrackDescriptor {
    pub fn kind(&self) -> MediaKind {
        match self.format {
            TrackFormat::Video { .. } => MediaKind::Video,
            TrackFormat::Audio { .. } => MediaKind::Audio,
        }
    }

    pub fn frame_rate(&self) -> Option<f64> {
        match self.format {
            TrackFormat::Video { frame_rate, .. } => Some(frame_rate),
            TrackFormat::Audio { .. } => None,
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        match self.format {
            TrackFormat::Audio { sample_rate, .. } => Some(sample_rate),
            TrackFormat::Video { .. } => None,
        }
    }

    pub fn rotation(&self) -> Option<Rotation> {
        match self.format {
            TrackFormat::Video { rotation, .. } => Some(rotation),
            TrackFormat::Audio { .. } => None,
        }
    }

    /// Returns a copy with the rotation replaced. Audio descriptors are
    /// returned unchanged.
    pub fn with_rotation(&self, rotation: Rotation) -> Self {
        let mut descriptor = self.clone();
        if let TrackFormat::Video {
            rotation: ref mut current,
            ..
        } = descriptor.format
        {
            *current = rotation;
        }
        descriptor
    }
}

/// Picks the first video and first audio track; later tracks of either kind
/// are ignored.
pub fn select_tracks(
    tracks: &[TrackDescriptor],
) -> (Option<&TrackDescriptor>, Option<&TrackDescriptor>) {
    let video = tracks.iter().find(|t| t.kind() == MediaKind::Video);
    let audio = tracks.iter().find(|t| t.kind() == MediaKind::Audio);
    (video, audio)
}
