//! Wire types and domain records shared between the `codec` and `bridge`
//! crates: the telephony and AI provider protocols, resolved session
//! configuration, and the append-only event/transcript records a Session
//! produces.

pub mod ai;
pub mod config;
pub mod event;
pub mod media;
pub mod telephony;
pub mod transcript;

pub use ai::{AiClientEvent, AiErrorDetail, AiServerEvent, SessionUpdatePayload};
pub use config::{ConfigError, Eagerness, SessionConfig, TurnDetection, Voice};
pub use event::{Direction, Event};
pub use media::{FramePayload, MediaFrame};
pub use telephony::{TelephonyInbound, TelephonyOutbound, Track};
pub use transcript::{Speaker, TranscriptItem};

/// 20 ms frame size on the telephony side: 160 bytes of G.711 µ-law at 8 kHz.
pub const TELEPHONY_FRAME_BYTES: usize = 160;
pub const TELEPHONY_SAMPLE_RATE: u32 = 8_000;

/// 20 ms frame size on the AI provider side: 480 PCM16 samples at 24 kHz.
pub const AI_FRAME_SAMPLES: usize = 480;
pub const AI_SAMPLE_RATE: u32 = 24_000;

pub const MEDIA_FRAME_MS: u32 = 20;
