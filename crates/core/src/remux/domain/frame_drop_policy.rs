/// Decides which video samples survive a speed-up without re-encoding.
///
/// Above 1x, every `stride`-th sample is kept, where
/// `stride = floor(speed - 1) + 1`. Keyframes are always kept so that the
/// frames following them stay decodable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDropPolicy {
    stride: usize,
}

impl FrameDropPolicy {
    pub fn for_speed(speed: f64) -> Self {
        let stride = if speed > 1.0 {
            (speed - 1.0).floor() as usize + 1
        } else {
            1
        };
        Self { stride }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn drops_frames(&self) -> bool {
        self.stride > 1
    }

    /// `ordinal` counts samples inside the trim window, starting at 0.
    pub fn keeps(&self, ordinal: usize, keyframe: bool) -> bool {
        keyframe || ordinal % self.stride == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.25, 1)]
    #[case(1.0, 1)]
    #[case(1.5, 1)]
    #[case(1.99, 1)]
    #[case(2.0, 2)]
    #[case(3.0, 3)]
    fn test_stride_for_speed(#[case] speed: f64, #[case] stride: usize) {
        assert_eq!(FrameDropPolicy::for_speed(speed).stride(), stride);
    }

    #[test]
    fn test_no_drops_at_or_below_normal_speed() {
        let policy = FrameDropPolicy::for_speed(1.0);
        assert!(!policy.drops_frames());
        assert!((0..50).all(|i| policy.keeps(i, false)));
    }

    #[test]
    fn test_double_speed_keeps_every_other_frame() {
        let policy = FrameDropPolicy::for_speed(2.0);
        let kept: Vec<usize> = (0..6).filter(|&i| policy.keeps(i, false)).collect();
        assert_eq!(kept, vec![0, 2, 4]);
    }

    #[test]
    fn test_keyframes_survive_modulus() {
        let policy = FrameDropPolicy::for_speed(2.0);
        assert!(!policy.keeps(3, false));
        assert!(policy.keeps(3, true));
    }
}
