use serde::{Deserialize, Serialize};

use crate::shared::error::ExportError;

/// 1.0 in the 16.16 fixed-point format used by display matrices.
const FIXED_16_16_ONE: i32 = 1 << 16;
/// 1.0 in the 2.30 fixed-point format used by the matrix's last column.
const FIXED_2_30_ONE: i32 = 1 << 30;
const DISPLAY_MATRIX_LEN: usize = 36;

/// Clockwise display rotation written to the output video track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Accepts any multiple of 90, including negative values and full turns.
    pub fn from_degrees(degrees: i32) -> Result<Self, ExportError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::None),
            90 => Ok(Self::Cw90),
            180 => Ok(Self::Cw180),
            270 => Ok(Self::Cw270),
            _ => Err(ExportError::InvalidJob(format!(
                "rotation must be a multiple of 90 degrees, got {degrees}"
            ))),
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    /// Serializes the rotation as a 3x3 display matrix: nine little-endian
    /// i32 values, 16.16 fixed point except the last column (2.30).
    pub fn display_matrix(self) -> [u8; DISPLAY_MATRIX_LEN] {
        let (cos, sin) = match self {
            Self::None => (FIXED_16_16_ONE, 0),
            Self::Cw90 => (0, FIXED_16_16_ONE),
            Self::Cw180 => (-FIXED_16_16_ONE, 0),
            Self::Cw270 => (0, -FIXED_16_16_ONE),
        };
        let matrix: [i32; 9] = [cos, sin, 0, -sin, cos, 0, 0, 0, FIXED_2_30_ONE];

        let mut bytes = [0u8; DISPLAY_MATRIX_LEN];
        for (chunk, value) in bytes.chunks_exact_mut(4).zip(matrix) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Recovers the clockwise rotation from display matrix side data,
    /// snapping to the nearest quarter turn.
    pub fn from_display_matrix(data: &[u8]) -> Option<Self> {
        if data.len() < DISPLAY_MATRIX_LEN {
            return None;
        }

        let m00 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64;
        let m01 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64;
        if m00 == 0.0 && m01 == 0.0 {
            return None;
        }

        let angle = m01.atan2(m00).to_degrees().round() as i32;
        Some(Self::nearest(angle))
    }

    /// Snaps an arbitrary angle to the closest of 0, 90, 180 or 270.
    pub fn nearest(angle: i32) -> Self {
        match angle.rem_euclid(360) {
            45..=134 => Self::Cw90,
            135..=224 => Self::Cw180,
            225..=315 => Self::Cw270,
            _ => Self::None,
        }
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<i32> for Rotation {
    type Error = ExportError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Self::from_degrees(degrees)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
