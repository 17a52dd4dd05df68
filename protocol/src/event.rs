use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the upstream (telephony or AI) into this bridge.
    Incoming,
    /// From this bridge out to the upstream.
    Outgoing,
}

/// One entry in a Session's append-only event log (§3). Mirrors whatever
/// crossed an upstream WebSocket in either direction, tagged for fan-out to
/// observers and storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub direction: Direction,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(
        session_id: impl Into<String>,
        event_type: impl Into<String>,
        direction: Direction,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            direction,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::new("CA1", "media", Direction::Incoming, serde_json::json!({}));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"media""#));
        assert!(json.contains(r#""direction":"incoming""#));
    }
}
