use std::collections::VecDeque;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::{TelephonyInbound, TelephonyOutbound};
use tracing::warn;

use crate::error::{BridgeError, BridgeResult};

/// 2 seconds of outbound media queued at 20ms/frame, the bound named in §4.4.
const QUEUE_BOUND_FRAMES: usize = 100;

/// Speaks the telephony provider's media-stream WebSocket protocol (§4.4).
/// Outbound sends made before `streamSid` is known are queued (bounded,
/// drop-oldest) and flushed once `start` arrives.
pub struct TelephonyClient {
    sender: SplitSink<WebSocket, Message>,
    receiver: SplitStream<WebSocket>,
    stream_sid: Option<String>,
    pending: VecDeque<TelephonyOutbound>,
}

impl TelephonyClient {
    pub fn new(socket: WebSocket) -> Self {
        let (sender, receiver) = socket.split();
        Self {
            sender,
            receiver,
            stream_sid: None,
            pending: VecDeque::new(),
        }
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    /// Called once the Session observes the `start` frame. Flushes any
    /// queued outbound sends in order.
    pub async fn on_start(&mut self, stream_sid: String) -> BridgeResult<()> {
        self.stream_sid = Some(stream_sid);
        let queued: Vec<_> = self.pending.drain(..).collect();
        for outbound in queued {
            self.send_now(&outbound).await?;
        }
        Ok(())
    }

    /// Send outbound media/mark/clear. Before `streamSid` is known, queues
    /// it (bounded, drop-oldest on overflow) instead of sending.
    pub async fn send(&mut self, outbound: TelephonyOutbound) -> BridgeResult<()> {
        if self.stream_sid.is_none() {
            if self.pending.len() >= QUEUE_BOUND_FRAMES {
                warn!("telephony outbound queue full before streamSid known, dropping oldest");
                self.pending.pop_front();
            }
            self.pending.push_back(outbound);
            return Ok(());
        }
        self.send_now(&outbound).await
    }

    async fn send_now(&mut self, outbound: &TelephonyOutbound) -> BridgeResult<()> {
        let text = serde_json::to_string(outbound)
            .map_err(|e| BridgeError::InternalInvariant(format!("failed to serialize: {e}")))?;
        self.sender
            .send(Message::Text(text))
            .await
            .map_err(|e| BridgeError::TransportFailure {
                transport: "telephony",
                source: e.into(),
            })
    }

    /// Receive and parse the next inbound telephony frame.
    pub async fn recv(&mut self) -> BridgeResult<Option<TelephonyInbound>> {
        loop {
            match self.receiver.next().await {
                Some(Ok(Message::Text(text))) => {
                    let parsed = serde_json::from_str(&text).map_err(|e| {
                        BridgeError::ProtocolViolation(format!("malformed telephony frame: {e}"))
                    })?;
                    return Ok(Some(parsed));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(BridgeError::TransportFailure {
                        transport: "telephony",
                        source: e.into(),
                    });
                }
            }
        }
    }

    pub async fn close(&mut self) {
        let _ = self.sender.close().await;
    }
}
