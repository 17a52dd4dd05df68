//! Bit-exact G.711 µ-law encode/decode (§4.1). Tables are built once at
//! first use and shared process-wide; lookup is branch-free on the hot path.

use std::sync::OnceLock;

const BIAS: i32 = 0x84; // added in encode, subtracted back out on decode
const ENCODE_BIAS: i32 = 33; // intentionally not equal to BIAS
const CLIP: i32 = 32635;

fn decode_table() -> &'static [i16; 256] {
    static TABLE: OnceLock<[i16; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0i16; 256];
        for (b, slot) in table.iter_mut().enumerate() {
            *slot = decode_uncached(b as u8);
        }
        table
    })
}

fn decode_uncached(b: u8) -> i16 {
    let inv = !b;
    let sign = inv & 0x80;
    let exponent = (inv >> 4) & 0x07;
    let mantissa = inv & 0x0F;
    let magnitude = (((mantissa as i32) << 3) + BIAS) << exponent;
    let magnitude = magnitude - BIAS;
    if sign != 0 {
        -(magnitude as i16).max(i16::MIN + 1)
    } else {
        magnitude.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }
}

/// Decode a single µ-law byte to a signed 16-bit PCM sample.
pub fn decode_sample(b: u8) -> i16 {
    decode_table()[b as usize]
}

/// Decode a buffer of µ-law bytes into PCM16 samples, one-to-one.
pub fn decode(input: &[u8]) -> Vec<i16> {
    input.iter().map(|&b| decode_sample(b)).collect()
}

fn top_bit(magnitude: i32) -> u8 {
    for exponent in (0..=7).rev() {
        if magnitude & (1 << (exponent + 7)) != 0 {
            return exponent;
        }
    }
    0
}

/// Encode a single signed 16-bit PCM sample to a µ-law byte.
pub fn encode_sample(sample: i16) -> u8 {
    let sign: i32 = if sample < 0 { 0x80 } else { 0x00 };
    let magnitude = (sample as i32).unsigned_abs() as i32;
    let magnitude = (magnitude + ENCODE_BIAS).min(CLIP);
    let exponent = top_bit(magnitude);
    let mantissa = (magnitude >> (exponent + 3)) & 0x0F;
    let byte = sign | ((exponent as i32) << 4) | mantissa;
    !(byte as u8)
}

/// Encode a buffer of PCM16 samples into µ-law bytes, one-to-one.
pub fn encode(input: &[i16]) -> Vec<u8> {
    input.iter().map(|&s| encode_sample(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_in_empty_out() {
        assert!(decode(&[]).is_empty());
        assert!(encode(&[]).is_empty());
    }

    #[test]
    fn silence_round_trips_near_zero() {
        // 0xFF is conventionally "digital silence" in µ-law.
        let decoded = decode_sample(0xFF);
        assert!(decoded.abs() < 100, "decoded silence was {decoded}");
    }

    #[test]
    fn encode_decode_round_trip_within_ten_percent() {
        for sample in [-30000i16, -1000, -100, 1, 100, 1000, 16000, 30000] {
            let encoded = encode_sample(sample);
            let decoded = decode_sample(encoded);
            let error = (decoded as f64 - sample as f64).abs() / (sample as f64).abs();
            assert!(
                error < 0.10,
                "sample {sample} round-tripped to {decoded}, error {error}"
            );
        }
    }

    #[test]
    fn decode_is_odd_symmetric_around_zero_byte_pairing() {
        // Sign bit flips the magnitude but not the shape of the curve.
        let positive = decode_sample(0x00); // sign bit clear after inversion at max exponent
        let negative = decode_sample(0x80);
        assert_eq!(positive, -negative);
    }

    #[test]
    fn buffer_decode_matches_scalar_decode() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let bulk = decode(&bytes);
        for (b, expected) in bytes.iter().zip(bulk.iter()) {
            assert_eq!(decode_sample(*b), *expected);
        }
    }

    #[test]
    fn full_byte_range_round_trips_without_panicking() {
        for b in 0u8..=255 {
            let sample = decode_sample(b);
            let _ = encode_sample(sample);
        }
    }
}
