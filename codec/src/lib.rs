//! Stateless audio codec primitives bridging the telephony (8 kHz G.711
//! µ-law) and AI provider (24 kHz PCM16) sides of a call, plus the frame
//! accumulation types the Session uses to line up chunk boundaries.

pub mod frame_buffer;
pub mod framing;
pub mod mulaw;
pub mod resample;
pub mod signal;

pub use frame_buffer::{ChunkSplitter, DurationTargetBuffer};
pub use framing::{
    FramingError, le_bytes_to_pcm16, pcm16_to_le_bytes, pcm24k_base64_to_ulaw_base64,
    ulaw_base64_to_pcm24k_base64,
};
pub use mulaw::{decode as mulaw_decode, decode_sample as mulaw_decode_sample};
pub use mulaw::{encode as mulaw_encode, encode_sample as mulaw_encode_sample};
pub use resample::{downsample_24k_to_8k, upsample_8k_to_24k};
pub use signal::{dbfs, has_signal, noise, rms, tone};
