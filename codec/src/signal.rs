//! RMS / dB / signal-presence helpers and deterministic generators used by
//! the codec's own tests and by the bridge's integration tests (§4.1 "Helpers").

use std::f64::consts::PI;

/// Root-mean-square amplitude of a PCM16 buffer. Zero for an empty buffer.
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sumsq: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
    (sumsq / samples.len() as f64).sqrt()
}

/// Decibels relative to full scale (32768). `-inf` maps to `f64::NEG_INFINITY`.
pub fn dbfs(rms: f64) -> f64 {
    20.0 * (rms / 32768.0).log10()
}

/// True once `rms` clears the digital-silence floor of 100.
pub fn has_signal(rms: f64) -> bool {
    rms > 100.0
}

/// Generate a pure sine tone at `frequency_hz`, `sample_rate_hz`, for `duration_ms`.
pub fn tone(frequency_hz: f64, sample_rate_hz: u32, duration_ms: u32, amplitude: i16) -> Vec<i16> {
    let num_samples = (sample_rate_hz as u64 * duration_ms as u64 / 1000) as usize;
    (0..num_samples)
        .map(|n| {
            let t = n as f64 / sample_rate_hz as f64;
            (amplitude as f64 * (2.0 * PI * frequency_hz * t).sin()).round() as i16
        })
        .collect()
}

/// Deterministic pseudo-noise generator (xorshift), seeded for repeatable tests.
pub fn noise(sample_rate_hz: u32, duration_ms: u32, amplitude: i16, seed: u64) -> Vec<i16> {
    let num_samples = (sample_rate_hz as u64 * duration_ms as u64 / 1000) as usize;
    let mut state = seed.max(1);
    (0..num_samples)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state % 2001) as i64 - 1000; // [-1000, 1000]
            ((unit * amplitude as i64) / 1000) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_empty_is_zero() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal_equals_its_magnitude() {
        assert_eq!(rms(&[1000, -1000, 1000, -1000]), 1000.0);
    }

    #[test]
    fn silence_has_no_signal() {
        assert!(!has_signal(rms(&[0i16; 160])));
    }

    #[test]
    fn loud_tone_has_signal() {
        let samples = tone(440.0, 8_000, 20, 8000);
        assert!(has_signal(rms(&samples)));
    }

    #[test]
    fn tone_has_expected_sample_count() {
        let samples = tone(440.0, 8_000, 20, 8000);
        assert_eq!(samples.len(), 160);
    }

    #[test]
    fn dbfs_of_full_scale_rms_is_zero() {
        assert!((dbfs(32768.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn noise_is_deterministic_for_a_given_seed() {
        let a = noise(8_000, 20, 4000, 42);
        let b = noise(8_000, 20, 4000, 42);
        assert_eq!(a, b);
    }
}
