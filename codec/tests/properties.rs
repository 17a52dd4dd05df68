//! Integration tests covering the codec properties: lossy round-trip bound,
//! resample length invariants, and full-pipeline framing exactness.

use codec::{
    downsample_24k_to_8k, has_signal, mulaw_decode, mulaw_encode, rms, tone,
    ulaw_base64_to_pcm24k_base64, upsample_8k_to_24k,
};

#[test]
fn silence_round_trip_stays_below_signal_floor() {
    let ulaw_silence = vec![0xFFu8; 160 * 50]; // 1 s at 8 kHz, 20 ms frames x 50
    let pcm = mulaw_decode(&ulaw_silence);
    assert!(!has_signal(rms(&pcm)));
}

#[test]
fn tone_round_trip_preserves_rms_within_half() {
    let source = tone(440.0, 8_000, 20, 8_000);
    let encoded = mulaw_encode(&source);
    let decoded = mulaw_decode(&encoded);
    let upsampled = upsample_8k_to_24k(&decoded);
    let downsampled = downsample_24k_to_8k(&upsampled);

    let source_rms = rms(&source);
    let roundtrip_rms = rms(&downsampled);
    let ratio = roundtrip_rms / source_rms;
    assert!(
        (0.5..=1.5).contains(&ratio),
        "round-trip rms ratio {ratio} outside +/-50% of source"
    );
}

#[test]
fn resample_length_invariants_hold_across_sizes() {
    for len in [0usize, 1, 2, 3, 160, 161, 480, 481] {
        let input = vec![1234i16; len];
        assert_eq!(upsample_8k_to_24k(&input).len(), 3 * len);
        assert_eq!(downsample_24k_to_8k(&input).len(), len / 3);
    }
}

#[test]
fn pipeline_framing_is_exact_telephony_frame_to_ai_frame() {
    // One 20ms telephony frame (160 bytes ulaw) must become exactly 960 bytes
    // of base64-decoded PCM16 at 24 kHz (480 samples x 2 bytes).
    use base64::Engine;
    let ulaw_frame = vec![0x7Fu8; 160];
    let b64 = base64::engine::general_purpose::STANDARD.encode(&ulaw_frame);
    let pcm24k_b64 = ulaw_base64_to_pcm24k_base64(&b64).unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&pcm24k_b64)
        .unwrap();
    assert_eq!(decoded.len(), 960);
}

#[test]
fn frame_order_is_preserved_across_concatenated_frames() {
    let frame_a = tone(440.0, 8_000, 20, 5_000);
    let frame_b = tone(220.0, 8_000, 20, 5_000);

    let upsampled_a = upsample_8k_to_24k(&frame_a);
    let upsampled_b = upsample_8k_to_24k(&frame_b);

    let mut concatenated_then_upsampled = frame_a.clone();
    concatenated_then_upsampled.extend_from_slice(&frame_b);
    let combined = upsample_8k_to_24k(&concatenated_then_upsampled);

    let mut separately_upsampled = upsampled_a.clone();
    separately_upsampled.extend_from_slice(&upsampled_b);

    // The boundary sample differs because "next" at the frame_a/frame_b seam
    // is computed differently (within-buffer vs treated as last-of-buffer),
    // but every other sample must match: order is preserved, not byte-identical
    // at a seam that straddles two independently-resampled chunks.
    assert_eq!(combined.len(), separately_upsampled.len());
    let last_of_a = frame_a.len() * 3 - 3;
    assert_eq!(combined[..last_of_a], separately_upsampled[..last_of_a]);
}
