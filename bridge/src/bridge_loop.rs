use std::time::Duration;

use axum::extract::ws::WebSocket;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use codec::{
    ChunkSplitter, FramingError, downsample_24k_to_8k, le_bytes_to_pcm16, mulaw_encode,
    ulaw_base64_to_pcm24k_base64,
};
#[cfg(feature = "recorder")]
use codec::{mulaw_decode, upsample_8k_to_24k};
use protocol::{
    AiClientEvent, AiServerEvent, Direction, TelephonyInbound, TelephonyOutbound, Track,
};
use tokio::time::{Instant, interval};
use tracing::{info, warn};

use crate::ai_client::{AiClient, log_fatal_reconnect_exhaustion};
use crate::server::AppState;
use crate::session::{EndReason, Phase, Session};
use crate::telephony_client::TelephonyClient;

const CONFIGURE_TIMEOUT: Duration = Duration::from_secs(15);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// One task per accepted `/media-stream` connection. Runs the telephony
/// receive loop and the AI receive loop concurrently via `select!`, which
/// keeps the per-session serial-state-mutation contract (§5) since both
/// arms call back into the same `Session` rather than sharing a lock
/// across I/O.
pub async fn run_call(socket: WebSocket, state: AppState) {
    let mut telephony = TelephonyClient::new(socket);

    let (call_id, session) = match wait_for_start(&mut telephony, &state).await {
        Ok(pair) => pair,
        Err(err) => {
            warn!(error = %err, "call ended before start frame observed");
            return;
        }
    };

    #[cfg(feature = "recorder")]
    if state.config.record_enabled {
        if let Some(dir) = &state.config.recorder_dir {
            let path = dir.join(format!("{call_id}.wav"));
            if let Some(recorder) = crate::recorder::Recorder::create(&path) {
                session.attach_recorder(recorder);
            }
        }
    }

    let mut ai = AiClient::new(state.config.ai_ws_url.clone(), state.config.ai_token.clone());
    if let Err(err) = ai.connect().await {
        warn!(call_id, error = %err, "initial AI connect failed");
        session.end(EndReason::Fatal(err.to_string())).await;
        state.registry.remove(&call_id);
        return;
    }

    session.begin_configuring(protocol::SessionConfig::default());
    if let Err(err) = ai
        .send_session_update(&protocol::SessionConfig::default())
        .await
    {
        session.end(EndReason::Fatal(err.to_string())).await;
        state.registry.remove(&call_id);
        return;
    }

    if let Err(err) = wait_for_ai_ready(&mut ai, &session).await {
        session.end(err.into()).await;
        telephony.close().await;
        ai.close().await;
        state.registry.remove(&call_id);
        return;
    }

    let replayed = session.activate();
    for ulaw_frame in replayed {
        forward_inbound_ulaw(&session, &mut ai, &ulaw_frame).await;
    }

    let mut ping_ticker = interval(KEEPALIVE_INTERVAL);
    let mut reconnect_attempt: u32 = 0;
    let mut outbound_splitter = ChunkSplitter::new(protocol::TELEPHONY_FRAME_BYTES);

    loop {
        tokio::select! {
            telephony_frame = telephony.recv() => {
                match telephony_frame {
                    Ok(Some(frame)) => {
                        if handle_telephony_frame(&session, &mut telephony, &mut ai, frame).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!(call_id, "telephony socket closed");
                        session.end(EndReason::TelephonyStop).await;
                        break;
                    }
                    Err(crate::error::BridgeError::ProtocolViolation(detail)) => {
                        warn!(call_id, detail, "malformed telephony frame, dropping and continuing");
                        session.record_event(
                            "telephony.protocol_violation",
                            Direction::Incoming,
                            serde_json::json!({ "detail": detail }),
                        );
                    }
                    Err(err) => {
                        warn!(call_id, error = %err, "telephony transport failure, ending call");
                        session.end(EndReason::Fatal(err.to_string())).await;
                        break;
                    }
                }
            }
            ai_event = ai.recv() => {
                match ai_event {
                    Ok(Some(event)) => {
                        handle_ai_event(&session, &mut telephony, &mut ai, &mut outbound_splitter, event).await;
                    }
                    Ok(None) => {
                        if reconnect_attempt == 0 {
                            warn!(call_id, "AI socket closed, attempting reconnect");
                        }
                        if ai.reconnect_with_backoff().await.is_err() {
                            log_fatal_reconnect_exhaustion(&crate::error::BridgeError::TransportFailure {
                                transport: "ai",
                                source: anyhow::anyhow!("reconnect attempts exhausted"),
                            });
                            session.end(EndReason::AiTransportExhausted).await;
                            break;
                        }
                        reconnect_attempt += 1;
                    }
                    Err(crate::error::BridgeError::ProtocolViolation(detail)) => {
                        warn!(call_id, detail, "malformed AI event, dropping and continuing");
                        session.record_event(
                            "ai.protocol_violation",
                            Direction::Incoming,
                            serde_json::json!({ "detail": detail }),
                        );
                    }
                    Err(err) => {
                        warn!(call_id, error = %err, "AI transport failure");
                        if ai.reconnect_with_backoff().await.is_err() {
                            session.end(EndReason::AiTransportExhausted).await;
                            break;
                        }
                    }
                }
            }
            _ = ping_ticker.tick() => {
                // tokio-tungstenite/axum handle ping/pong transparently at the
                // protocol layer; this tick only exists to notice a session
                // that has gone completely idle.
                if session.is_ended() {
                    break;
                }
            }
        }

        if let Some(reason) = session.check_state_timeout() {
            session.end(reason).await;
            break;
        }
    }

    telephony.close().await;
    ai.close().await;
    state.registry.remove(&call_id);
}

async fn wait_for_start(
    telephony: &mut TelephonyClient,
    state: &AppState,
) -> anyhow::Result<(String, std::sync::Arc<Session>)> {
    loop {
        match telephony.recv().await? {
            Some(TelephonyInbound::Connected { .. }) => continue,
            Some(TelephonyInbound::Start { start, .. }) => {
                let call_id = start.call_sid.clone();
                let session = state
                    .registry
                    .get_or_insert_with(call_id.clone(), || {
                        Session::new(call_id.clone(), state.storage.clone())
                    });
                telephony.on_start(start.stream_sid.clone()).await.ok();
                return Ok((call_id, session));
            }
            Some(_) => continue,
            None => anyhow::bail!("socket closed before start frame"),
        }
    }
}

async fn wait_for_ai_ready(
    ai: &mut AiClient,
    session: &Session,
) -> Result<(), crate::error::BridgeError> {
    let deadline = Instant::now() + CONFIGURE_TIMEOUT;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return Err(crate::error::BridgeError::Timeout {
                state: "Configuring",
                elapsed_ms: CONFIGURE_TIMEOUT.as_millis() as u64,
            });
        }
        match tokio::time::timeout(remaining, ai.recv()).await {
            Ok(Ok(Some(AiServerEvent::SessionCreated { .. }))) => continue,
            Ok(Ok(Some(AiServerEvent::SessionUpdated))) => {
                session.mark_configured();
                return Ok(());
            }
            Ok(Ok(Some(_))) => continue,
            Ok(Ok(None)) => {
                return Err(crate::error::BridgeError::TransportFailure {
                    transport: "ai",
                    source: anyhow::anyhow!("closed during configuration"),
                });
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(crate::error::BridgeError::Timeout {
                    state: "Configuring",
                    elapsed_ms: CONFIGURE_TIMEOUT.as_millis() as u64,
                });
            }
        }
    }
}

/// Returns `true` if the call loop should stop.
async fn handle_telephony_frame(
    session: &Session,
    telephony: &mut TelephonyClient,
    ai: &mut AiClient,
    frame: TelephonyInbound,
) -> bool {
    match frame {
        TelephonyInbound::Media { media, .. } => {
            if media.track != Track::Inbound {
                return false;
            }
            if session.phase() != Phase::Active {
                if let Ok(bytes) = BASE64.decode(&media.payload) {
                    session.buffer_early_audio(bytes);
                }
                return false;
            }
            session.record_event(
                "telephony.media",
                Direction::Incoming,
                serde_json::json!({ "track": "inbound" }),
            );
            let bytes = BASE64.decode(&media.payload).unwrap_or_default();
            #[cfg(feature = "recorder")]
            {
                let caller_pcm_24k = upsample_8k_to_24k(&mulaw_decode(&bytes));
                session.write_mixed_frame(&caller_pcm_24k, &[]);
            }
            forward_inbound_ulaw(session, ai, &bytes).await;
            false
        }
        TelephonyInbound::Stop { .. } => {
            session.end(EndReason::TelephonyStop).await;
            telephony.close().await;
            true
        }
        TelephonyInbound::Dtmf { dtmf, .. } => {
            session.record_event(
                "telephony.dtmf",
                Direction::Incoming,
                serde_json::json!({ "digit": dtmf.digit }),
            );
            false
        }
        TelephonyInbound::Mark { mark, .. } => {
            session.record_event(
                "telephony.mark",
                Direction::Incoming,
                serde_json::json!({ "name": mark.name }),
            );
            false
        }
        TelephonyInbound::Connected { .. } | TelephonyInbound::Start { .. } => false,
    }
}

async fn forward_inbound_ulaw(session: &Session, ai: &mut AiClient, ulaw_bytes: &[u8]) {
    let ulaw_b64 = BASE64.encode(ulaw_bytes);
    match ulaw_base64_to_pcm24k_base64(&ulaw_b64) {
        Ok(pcm_b64) => {
            let _index = session.next_inbound_frame_index();
            if let Err(err) = ai
                .send(&AiClientEvent::InputAudioBufferAppend { audio: pcm_b64 })
                .await
            {
                warn!(error = %err, "failed to forward inbound audio to AI");
            }
        }
        Err(err) => {
            warn!(error = %err, "dropping malformed inbound telephony frame");
        }
    }
}

/// Decode a `response.audio.delta`'s base64 PCM16 LE payload (24 kHz) into
/// samples, without the downsample/µ-law/re-encode steps the inbound
/// composite helper bundles — the outbound path needs the raw 24 kHz
/// samples for the recorder before it resamples and chunks them.
fn decode_pcm24k_delta(delta: &str) -> Result<Vec<i16>, FramingError> {
    let bytes = BASE64.decode(delta)?;
    le_bytes_to_pcm16(&bytes)
}

async fn handle_ai_event(
    session: &Session,
    telephony: &mut TelephonyClient,
    ai: &mut AiClient,
    outbound_splitter: &mut ChunkSplitter,
    event: AiServerEvent,
) {
    match event {
        AiServerEvent::SessionCreated { .. } | AiServerEvent::SessionUpdated => {}
        AiServerEvent::ResponseAudioDelta { response_id, item_id, delta } => {
            let response_id = response_id.unwrap_or_default();
            let item_id = item_id.unwrap_or_default();
            session.on_assistant_audio_started(response_id, item_id);
            match decode_pcm24k_delta(&delta) {
                Ok(pcm_24k) => {
                    #[cfg(feature = "recorder")]
                    session.write_mixed_frame(&[], &pcm_24k);

                    // §4.5 rule 2: split outbound audio into exact 160-byte
                    // telephony frames rather than forwarding each delta as
                    // one (possibly oversized or undersized) frame.
                    outbound_splitter.push(&downsample_24k_to_8k(&pcm_24k));
                    for chunk in outbound_splitter.drain_chunks() {
                        let ulaw_b64 = BASE64.encode(mulaw_encode(&chunk));
                        let _index = session.next_outbound_frame_index();
                        let _ = telephony
                            .send(TelephonyOutbound::media(
                                telephony.stream_sid().unwrap_or_default().to_string(),
                                ulaw_b64,
                            ))
                            .await;
                    }
                }
                Err(err) => warn!(error = %err, "dropping malformed AI audio delta"),
            }
        }
        AiServerEvent::ResponseAudioDone { response_id } => {
            session.on_assistant_audio_done();
            if let Some(stream_sid) = telephony.stream_sid().map(str::to_string) {
                let _ = telephony
                    .send(TelephonyOutbound::mark(
                        stream_sid,
                        response_id.unwrap_or_else(|| "response".to_string()),
                    ))
                    .await;
            }
        }
        AiServerEvent::ResponseAudioTranscriptDelta { delta } => {
            session.append_assistant_transcript_delta(&delta);
            session.record_event(
                "assistant.transcript.delta",
                Direction::Incoming,
                serde_json::json!({ "delta": delta }),
            );
        }
        AiServerEvent::ResponseAudioTranscriptDone { .. } => {
            let item = session.finalize_assistant_transcript(0);
            session.record_transcript_item(item).await;
        }
        AiServerEvent::InputAudioTranscriptionCompleted { transcript } => {
            let item = session.finalize_user_transcript(transcript, 0);
            session.record_transcript_item(item).await;
        }
        AiServerEvent::SpeechStarted => {
            // Order matters here (§8 property 6): clear the telephony
            // playback buffer before telling the provider to truncate.
            let action = session.on_user_speech_started();
            if action.send_clear {
                if let Some(stream_sid) = telephony.stream_sid().map(str::to_string) {
                    let _ = telephony.send(TelephonyOutbound::clear(stream_sid)).await;
                }
            }
            if let Some(item_id) = action.truncate_item_id {
                let _ = ai
                    .send(&AiClientEvent::ConversationItemTruncate {
                        item_id: item_id.clone(),
                        content_index: action.truncate_content_index,
                        audio_end_ms: action.truncate_audio_end_ms,
                    })
                    .await;
                session.record_event(
                    "ai.barge_in.truncate",
                    Direction::Outgoing,
                    serde_json::json!({
                        "item_id": item_id,
                        "audio_end_ms": action.truncate_audio_end_ms,
                    }),
                );
            }
        }
        AiServerEvent::SpeechStopped => {
            session.on_user_speech_stopped();
        }
        AiServerEvent::Error { detail } => {
            let is_fatal = matches!(
                detail.code.as_deref(),
                Some("invalid_auth") | Some("insufficient_quota")
            );
            session.record_event(
                "ai.error",
                Direction::Incoming,
                serde_json::json!({ "code": detail.code, "message": detail.message }),
            );
            if is_fatal {
                session.end(EndReason::Fatal(detail.message)).await;
            }
        }
        AiServerEvent::Unknown { event_type, raw } => {
            session.record_event("ai.unknown", Direction::Incoming, serde_json::json!({ "type": event_type, "raw": raw }));
        }
    }
}
