use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use protocol::{AiClientEvent, AiServerEvent, SessionConfig, SessionUpdatePayload};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{error, info, warn};

use crate::error::{BridgeError, BridgeResult};

const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_CAP: Duration = Duration::from_secs(30);
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

type AiSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exponential backoff schedule for AI transport reconnects: base 1s, cap
/// 30s, doubling each attempt, capped at five attempts total.
pub fn reconnect_delay(attempt: u32) -> Option<Duration> {
    if attempt >= MAX_RECONNECT_ATTEMPTS {
        return None;
    }
    let scaled = RECONNECT_BASE.saturating_mul(1u32 << attempt.min(16));
    Some(scaled.min(RECONNECT_CAP))
}

/// Speaks the AI provider's realtime JSON-over-WebSocket protocol for one
/// Session (§4.3). Owns the socket exclusively; every send is serialized
/// through `send`.
pub struct AiClient {
    url: String,
    token: Option<String>,
    socket: Option<AiSocket>,
}

impl AiClient {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token,
            socket: None,
        }
    }

    pub async fn connect(&mut self) -> BridgeResult<()> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::Configuration(format!("invalid AI ws url: {e}")))?;
        if let Some(token) = &self.token {
            request.headers_mut().insert(
                "Authorization",
                format!("Bearer {token}")
                    .parse()
                    .map_err(|e| BridgeError::Configuration(format!("invalid token: {e}")))?,
            );
        }
        let (socket, _response) =
            connect_async(request)
                .await
                .map_err(|e| BridgeError::TransportFailure {
                    transport: "ai",
                    source: e.into(),
                })?;
        self.socket = Some(socket);
        Ok(())
    }

    /// Reconnect with exponential backoff, up to five attempts. Returns
    /// `Ok(())` once connected, or the last error once attempts are
    /// exhausted.
    pub async fn reconnect_with_backoff(&mut self) -> BridgeResult<()> {
        let mut attempt = 0;
        loop {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    let Some(delay) = reconnect_delay(attempt) else {
                        return Err(err);
                    };
                    warn!(attempt, ?delay, "AI reconnect failed, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn send(&mut self, event: &AiClientEvent) -> BridgeResult<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| BridgeError::TransportFailure {
                transport: "ai",
                source: anyhow::anyhow!("not connected"),
            })?;
        let text = serde_json::to_string(event)
            .map_err(|e| BridgeError::InternalInvariant(format!("failed to serialize: {e}")))?;
        socket
            .send(Message::Text(text))
            .await
            .map_err(|e| BridgeError::TransportFailure {
                transport: "ai",
                source: e.into(),
            })
    }

    pub async fn send_session_update(&mut self, config: &SessionConfig) -> BridgeResult<()> {
        let session = SessionUpdatePayload::from_config(config);
        self.send(&AiClientEvent::SessionUpdate { session }).await
    }

    /// Receive the next event from the AI socket, parsed into a typed
    /// variant. Unknown event types still return `Ok(Some(..))` carrying
    /// `AiServerEvent::Unknown` so the Session can log them without losing
    /// forward compatibility.
    pub async fn recv(&mut self) -> BridgeResult<Option<AiServerEvent>> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| BridgeError::TransportFailure {
                transport: "ai",
                source: anyhow::anyhow!("not connected"),
            })?;
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    return AiServerEvent::parse(&text).map(Some).map_err(|e| {
                        BridgeError::ProtocolViolation(format!("malformed AI event: {e}"))
                    });
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(BridgeError::TransportFailure {
                        transport: "ai",
                        source: e.into(),
                    });
                }
            }
        }
    }

    pub async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                info!(error = %e, "error closing AI socket, ignoring");
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}

pub fn log_fatal_reconnect_exhaustion(err: &BridgeError) {
    error!(error = %err, "AI reconnect attempts exhausted, session will terminate");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_doubles_and_caps() {
        assert_eq!(reconnect_delay(0), Some(Duration::from_secs(1)));
        assert_eq!(reconnect_delay(1), Some(Duration::from_secs(2)));
        assert_eq!(reconnect_delay(2), Some(Duration::from_secs(4)));
        assert_eq!(reconnect_delay(3), Some(Duration::from_secs(8)));
        assert_eq!(reconnect_delay(4), Some(Duration::from_secs(16)));
    }

    #[test]
    fn backoff_is_exhausted_after_five_attempts() {
        assert!(reconnect_delay(5).is_none());
    }

    #[test]
    fn backoff_never_exceeds_cap() {
        for attempt in 0..5 {
            assert!(reconnect_delay(attempt).unwrap() <= RECONNECT_CAP);
        }
    }
}
