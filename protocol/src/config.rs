use serde::{Deserialize, Serialize};

/// Max length of `SessionConfig::instructions`, per §3.
pub const MAX_INSTRUCTIONS_CHARS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Marin,
    Cedar,
    Alloy,
    Echo,
    Shimmer,
    Ash,
    Ballad,
    Coral,
    Sage,
    Verse,
}

impl Default for Voice {
    fn default() -> Self {
        Voice::Marin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eagerness {
    Low,
    Medium,
    High,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad {
        threshold: f32,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
        create_response: bool,
    },
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        eagerness: Eagerness,
        create_response: bool,
    },
}

impl Default for TurnDetection {
    fn default() -> Self {
        TurnDetection::ServerVad {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
            create_response: true,
        }
    }
}

/// Resolved session configuration, built at session creation from a prompt
/// lookup, an inline config from the dialling client, or system defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub voice: Voice,
    #[serde(default)]
    pub turn_detection: TurnDetection,
    #[serde(default)]
    pub transcription_model: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for Eagerness {
    fn default() -> Self {
        Eagerness::Auto
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("instructions exceed {MAX_INSTRUCTIONS_CHARS} chars (got {0})")]
    InstructionsTooLong(usize),
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(instructions) = &self.instructions {
            if instructions.chars().count() > MAX_INSTRUCTIONS_CHARS {
                return Err(ConfigError::InstructionsTooLong(instructions.chars().count()));
            }
        }
        Ok(())
    }
}
