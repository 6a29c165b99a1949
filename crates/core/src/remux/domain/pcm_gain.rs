/// Scales a payload in place as signed 16-bit little-endian samples.
///
/// Each value is multiplied, truncated toward zero and clamped to the i16
/// range. A trailing odd byte is left untouched. A volume of exactly 1.0
/// leaves the payload byte-identical.
///
/// This works on the container's sample bytes without decoding, so it is
/// only exact when the track carries raw PCM.
pub fn apply_gain(payload: &mut [u8], volume: f64) {
    if volume == 1.0 {
        return;
    }

    for pair in payload.chunks_exact_mut(2) {
        let value = i16::from_le_bytes([pair[0], pair[1]]);
        let scaled = (value as f64 * volume) as i64;
        let clamped = scaled.clamp(i16::MIN as i64, i16::MAX as i64) as i16;
        pair.copy_from_slice(&clamped.to_le_bytes());
    }
}
