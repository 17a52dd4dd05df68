use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One finalised or in-flight utterance transcript (§3). Streaming deltas are
/// accumulated by the Session and only become a `TranscriptItem` once final.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptItem {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    /// Monotonic milliseconds from session start.
    pub offset_ms: i64,
    pub is_final: bool,
}

impl TranscriptItem {
    pub fn new(speaker: Speaker, text: impl Into<String>, offset_ms: i64, is_final: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            text: text.into(),
            offset_ms,
            is_final,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_is_tagged_with_speaker_and_finality() {
        let item = TranscriptItem::new(Speaker::Assistant, "hello there", 1200, true);
        assert_eq!(item.speaker, Speaker::Assistant);
        assert!(item.is_final);
        assert_eq!(item.offset_ms, 1200);
    }
}
