//! 3× linear-interpolation upsampling (8 kHz → 24 kHz) and 3-tap averaging
//! downsampling (24 kHz → 8 kHz). Length relations are exact and load-bearing:
//! downstream framing assumes `|out| = 3·|in|` and `|out| = floor(|in| / 3)`.

/// Upsample 8 kHz PCM16 to 24 kHz by 3-way linear interpolation.
pub fn upsample_8k_to_24k(input: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(input.len() * 3);
    for i in 0..input.len() {
        let cur = input[i] as i32;
        let next = input.get(i + 1).copied().unwrap_or(input[i]) as i32;
        let delta = next - cur;
        out.push(cur as i16);
        out.push(interpolate(cur, delta, 1));
        out.push(interpolate(cur, delta, 2));
    }
    out
}

fn interpolate(base: i32, delta: i32, third: i32) -> i16 {
    let value = base as f64 + (delta as f64) * (third as f64) / 3.0;
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Downsample 24 kHz PCM16 to 8 kHz by averaging non-overlapping groups of three samples,
/// padding the final partial group by repeating the last sample.
pub fn downsample_24k_to_8k(input: &[i16]) -> Vec<i16> {
    let out_len = input.len() / 3;
    let mut out = Vec::with_capacity(out_len);
    for j in 0..out_len {
        let base = 3 * j;
        let a = input[base] as i32;
        let b = input.get(base + 1).copied().unwrap_or(input[base]) as i32;
        let c = input.get(base + 2).copied().unwrap_or(input[base]) as i32;
        let avg = (a + b + c) as f64 / 3.0;
        out.push(avg.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_in_empty_out() {
        assert!(upsample_8k_to_24k(&[]).is_empty());
        assert!(downsample_24k_to_8k(&[]).is_empty());
    }

    #[test]
    fn upsample_length_is_exactly_triple() {
        let input: Vec<i16> = (0..160).map(|i| (i * 7) as i16).collect();
        assert_eq!(upsample_8k_to_24k(&input).len(), input.len() * 3);
    }

    #[test]
    fn downsample_length_is_floor_third() {
        for len in [0usize, 1, 2, 3, 4, 480, 481, 482] {
            let input = vec![1000i16; len];
            assert_eq!(downsample_24k_to_8k(&input).len(), len / 3);
        }
    }

    #[test]
    fn upsample_preserves_constant_signal() {
        let input = vec![500i16; 10];
        let out = upsample_8k_to_24k(&input);
        assert!(out.iter().all(|&s| s == 500));
    }

    #[test]
    fn downsample_preserves_constant_signal() {
        let input = vec![500i16; 30];
        let out = downsample_24k_to_8k(&input);
        assert!(out.iter().all(|&s| s == 500));
    }

    #[test]
    fn upsample_first_tap_equals_source_sample() {
        let input = vec![100i16, 400, 700];
        let out = upsample_8k_to_24k(&input);
        assert_eq!(out[0], 100);
        assert_eq!(out[3], 400);
        assert_eq!(out[6], 700);
    }

    #[test]
    fn round_trip_preserves_rms_within_tolerance() {
        let input: Vec<i16> = (0..480)
            .map(|i| ((i as f64 * 0.2).sin() * 8000.0) as i16)
            .collect();
        let down = downsample_24k_to_8k(&input);
        let back = upsample_8k_to_24k(&down);
        assert_eq!(back.len(), down.len() * 3);
        let rms = |buf: &[i16]| {
            let sumsq: f64 = buf.iter().map(|&s| (s as f64).powi(2)).sum();
            (sumsq / buf.len() as f64).sqrt()
        };
        let original_rms = rms(&input);
        let roundtrip_rms = rms(&back);
        let diff = (original_rms - roundtrip_rms).abs() / original_rms;
        assert!(diff < 0.5, "rms drifted too far: {diff}");
    }
}
