//! Base64 composite functions binding the telephony and AI provider wire
//! formats to the codec/resample primitives (§4.1 "Base-64 framing").

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

use crate::mulaw;
use crate::resample;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("pcm16 payload has odd byte length {0}, cannot form an aligned sample view")]
    UnalignedPcm16(usize),
}

/// Decode base64 µ-law → PCM16 → resample to 24 kHz → re-encode base64 PCM16 LE.
pub fn ulaw_base64_to_pcm24k_base64(input: &str) -> Result<String, FramingError> {
    let ulaw_bytes = BASE64.decode(input)?;
    let pcm_8k = mulaw::decode(&ulaw_bytes);
    let pcm_24k = resample::upsample_8k_to_24k(&pcm_8k);
    Ok(BASE64.encode(pcm16_to_le_bytes(&pcm_24k)))
}

/// Decode base64 PCM16 LE (24 kHz) → resample to 8 kHz → µ-law encode → base64.
pub fn pcm24k_base64_to_ulaw_base64(input: &str) -> Result<String, FramingError> {
    let pcm_bytes = BASE64.decode(input)?;
    let pcm_24k = le_bytes_to_pcm16(&pcm_bytes)?;
    let pcm_8k = resample::downsample_24k_to_8k(&pcm_24k);
    let ulaw_bytes = mulaw::encode(&pcm_8k);
    Ok(BASE64.encode(ulaw_bytes))
}

pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

pub fn le_bytes_to_pcm16(bytes: &[u8]) -> Result<Vec<i16>, FramingError> {
    if bytes.len() % 2 != 0 {
        return Err(FramingError::UnalignedPcm16(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_base64_round_trips_to_empty() {
        let out = ulaw_base64_to_pcm24k_base64("").unwrap();
        assert_eq!(out, "");
        let back = pcm24k_base64_to_ulaw_base64("").unwrap();
        assert_eq!(back, "");
    }

    #[test]
    fn ulaw_frame_upsamples_to_three_times_byte_count() {
        let ulaw_bytes = vec![0xFFu8; 160];
        let input = BASE64.encode(&ulaw_bytes);
        let out = ulaw_base64_to_pcm24k_base64(&input).unwrap();
        let decoded = BASE64.decode(&out).unwrap();
        // 160 ulaw bytes -> 160 pcm16 samples -> 480 pcm16 samples -> 960 bytes.
        assert_eq!(decoded.len(), 960);
    }

    #[test]
    fn pcm24k_frame_downsamples_to_telephony_frame_size() {
        let samples = vec![0i16; 480];
        let input = BASE64.encode(pcm16_to_le_bytes(&samples));
        let out = pcm24k_base64_to_ulaw_base64(&input).unwrap();
        let decoded = BASE64.decode(&out).unwrap();
        assert_eq!(decoded.len(), 160);
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(ulaw_base64_to_pcm24k_base64("not valid base64!!").is_err());
    }

    #[test]
    fn rejects_unaligned_pcm16_payload() {
        let input = BASE64.encode([0u8; 3]);
        assert!(matches!(
            pcm24k_base64_to_ulaw_base64(&input),
            Err(FramingError::UnalignedPcm16(3))
        ));
    }
}
