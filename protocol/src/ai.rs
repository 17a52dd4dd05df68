use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{SessionConfig, TurnDetection, Voice};

/// The `session` object nested inside an outbound `session.update` message.
/// Audio is always PCM16 24 kHz mono on this side; µ-law <-> PCM conversion
/// happens in the Session, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdatePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub voice: Voice,
    pub turn_detection: TurnDetection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,
    pub input_audio_format: AudioFormat,
    pub output_audio_format: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Pcm16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

impl SessionUpdatePayload {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            instructions: config.instructions.clone(),
            voice: config.voice,
            turn_detection: config.turn_detection.clone(),
            input_audio_transcription: config
                .transcription_model
                .clone()
                .map(|model| InputAudioTranscription { model }),
            input_audio_format: AudioFormat::Pcm16,
            output_audio_format: AudioFormat::Pcm16,
            model: config.model.clone(),
        }
    }
}

/// Messages this bridge sends to the AI provider, verbatim wire `type` names
/// per §4.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AiClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdatePayload },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
    #[serde(rename = "response.create")]
    ResponseCreate,
    #[serde(rename = "response.cancel")]
    ResponseCancel,
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: i64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Messages received from the AI provider. `Unknown` is the forward-compat
/// catch-all per the REDESIGN FLAGS: exhaustive match on everything named in
/// §4.3, never a loose key lookup.
#[derive(Debug, Clone)]
pub enum AiServerEvent {
    SessionCreated { session_id: Option<String> },
    SessionUpdated,
    ResponseAudioDelta {
        response_id: Option<String>,
        item_id: Option<String>,
        delta: String,
    },
    ResponseAudioDone { response_id: Option<String> },
    ResponseAudioTranscriptDelta { delta: String },
    ResponseAudioTranscriptDone { transcript: String },
    InputAudioTranscriptionCompleted { transcript: String },
    SpeechStarted,
    SpeechStopped,
    Error { detail: AiErrorDetail },
    Unknown { event_type: String, raw: Value },
}

impl AiServerEvent {
    /// Parse a raw JSON text frame from the AI provider's WebSocket.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: Value = serde_json::from_str(text)?;
        let event_type = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let event = match event_type.as_str() {
            "session.created" => AiServerEvent::SessionCreated {
                session_id: raw
                    .get("session")
                    .and_then(|s| s.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            "session.updated" => AiServerEvent::SessionUpdated,
            "response.audio.delta" => AiServerEvent::ResponseAudioDelta {
                response_id: raw
                    .get("response_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                item_id: raw
                    .get("item_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                delta: raw
                    .get("delta")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "response.audio.done" => AiServerEvent::ResponseAudioDone {
                response_id: raw
                    .get("response_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            "response.audio_transcript.delta" => AiServerEvent::ResponseAudioTranscriptDelta {
                delta: raw
                    .get("delta")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "response.audio_transcript.done" => AiServerEvent::ResponseAudioTranscriptDone {
                transcript: raw
                    .get("transcript")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            "conversation.item.input_audio_transcription.completed" => {
                AiServerEvent::InputAudioTranscriptionCompleted {
                    transcript: raw
                        .get("transcript")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }
            }
            "input_audio_buffer.speech_started" => AiServerEvent::SpeechStarted,
            "input_audio_buffer.speech_stopped" => AiServerEvent::SpeechStopped,
            "error" => {
                let error_obj = raw.get("error").cloned().unwrap_or(Value::Null);
                AiServerEvent::Error {
                    detail: AiErrorDetail {
                        code: error_obj
                            .get("code")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        message: error_obj
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown AI provider error")
                            .to_string(),
                    },
                }
            }
            _ => AiServerEvent::Unknown {
                event_type,
                raw,
            },
        };
        Ok(event)
    }

    pub fn event_type(&self) -> &str {
        match self {
            AiServerEvent::SessionCreated { .. } => "session.created",
            AiServerEvent::SessionUpdated => "session.updated",
            AiServerEvent::ResponseAudioDelta { .. } => "response.audio.delta",
            AiServerEvent::ResponseAudioDone { .. } => "response.audio.done",
            AiServerEvent::ResponseAudioTranscriptDelta { .. } => {
                "response.audio_transcript.delta"
            }
            AiServerEvent::ResponseAudioTranscriptDone { .. } => "response.audio_transcript.done",
            AiServerEvent::InputAudioTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            AiServerEvent::SpeechStarted => "input_audio_buffer.speech_started",
            AiServerEvent::SpeechStopped => "input_audio_buffer.speech_stopped",
            AiServerEvent::Error { .. } => "error",
            AiServerEvent::Unknown { event_type, .. } => event_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_serializes_expected_shape() {
        let config = SessionConfig::default();
        let payload = SessionUpdatePayload::from_config(&config);
        let event = AiClientEvent::SessionUpdate { session: payload };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"session.update""#));
        assert!(json.contains(r#""input_audio_format":"pcm16""#));
        assert!(json.contains(r#""output_audio_format":"pcm16""#));
    }

    #[test]
    fn input_audio_buffer_append_round_trips() {
        let event = AiClientEvent::InputAudioBufferAppend {
            audio: "AAAA".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"input_audio_buffer.append","audio":"AAAA"}"#);
    }

    #[test]
    fn parses_session_created() {
        let event = AiServerEvent::parse(r#"{"type":"session.created","session":{"id":"sess_1"}}"#)
            .unwrap();
        match event {
            AiServerEvent::SessionCreated { session_id } => {
                assert_eq!(session_id.as_deref(), Some("sess_1"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_audio_delta() {
        let event =
            AiServerEvent::parse(r#"{"type":"response.audio.delta","delta":"AAAA"}"#).unwrap();
        assert!(matches!(event, AiServerEvent::ResponseAudioDelta { .. }));
    }

    #[test]
    fn parses_error() {
        let event = AiServerEvent::parse(
            r#"{"type":"error","error":{"code":"invalid_request","message":"bad request"}}"#,
        )
        .unwrap();
        match event {
            AiServerEvent::Error { detail } => {
                assert_eq!(detail.code.as_deref(), Some("invalid_request"));
                assert_eq!(detail.message, "bad request");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_are_preserved_not_dropped() {
        let event = AiServerEvent::parse(r#"{"type":"response.function_call_arguments.delta"}"#)
            .unwrap();
        match event {
            AiServerEvent::Unknown { event_type, .. } => {
                assert_eq!(event_type, "response.function_call_arguments.delta");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn event_type_round_trips_for_every_known_variant() {
        let event = AiServerEvent::SpeechStarted;
        assert_eq!(event.event_type(), "input_audio_buffer.speech_started");
    }
}
