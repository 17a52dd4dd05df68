use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use protocol::{Direction, Event, SessionConfig, Speaker, TranscriptItem};
use tracing::{info, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::observer::ObserverHub;
use crate::storage::StorageSink;

#[cfg(feature = "recorder")]
use crate::recorder::Recorder;

const EVENT_LOG_CAPACITY: usize = 1024;
const EARLY_AUDIO_BUDGET_MS: u64 = 2_000;
const CONFIGURING_TIMEOUT: Duration = Duration::from_secs(15);
const READY_TO_ACTIVE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Configuring,
    Ready,
    Active,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    TelephonyStop,
    AiTransportExhausted,
    ExplicitEndRequest,
    Timeout(&'static str),
    Fatal(String),
}

/// Instructions the connection-handling tasks must carry out in response to
/// a state transition. The Session itself never touches a socket directly;
/// it only decides what must be sent and returns that decision.
#[derive(Debug, Clone)]
pub struct BargeInAction {
    pub send_clear: bool,
    pub truncate_item_id: Option<String>,
    pub truncate_content_index: u32,
    pub truncate_audio_end_ms: i64,
}

struct AssistantResponse {
    response_id: String,
    item_id: String,
    first_delta_at: Instant,
}

struct Inner {
    phase: Phase,
    end_reason: Option<EndReason>,
    current_response: Option<AssistantResponse>,
    pending_assistant_transcript: String,
    early_audio: VecDeque<Vec<u8>>,
    early_audio_bytes: usize,
    events: VecDeque<Event>,
    config: SessionConfig,
    entered_at: Instant,
}

/// Wires the telephony and AI clients together and runs the call's state
/// machine (§4.5). Owned as `Arc<Session>` by the registry and by every
/// per-connection task for that call.
pub struct Session {
    pub call_id: String,
    inner: Mutex<Inner>,
    user_speaking: AtomicBool,
    assistant_speaking: AtomicBool,
    inbound_frame_index: AtomicI64,
    outbound_frame_index: AtomicI64,
    observers: ObserverHub,
    storage: Option<Arc<dyn StorageSink>>,
    #[cfg(feature = "recorder")]
    recorder: Mutex<Option<Recorder>>,
}

impl Session {
    pub fn new(call_id: impl Into<String>, storage: Option<Arc<dyn StorageSink>>) -> Arc<Self> {
        Arc::new(Self {
            call_id: call_id.into(),
            inner: Mutex::new(Inner {
                phase: Phase::Initializing,
                end_reason: None,
                current_response: None,
                pending_assistant_transcript: String::new(),
                early_audio: VecDeque::new(),
                early_audio_bytes: 0,
                events: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
                config: SessionConfig::default(),
                entered_at: Instant::now(),
            }),
            user_speaking: AtomicBool::new(false),
            assistant_speaking: AtomicBool::new(false),
            inbound_frame_index: AtomicI64::new(0),
            outbound_frame_index: AtomicI64::new(0),
            observers: ObserverHub::new(),
            storage,
            #[cfg(feature = "recorder")]
            recorder: Mutex::new(None),
        })
    }

    #[cfg(test)]
    pub fn new_for_test(call_id: impl Into<String>) -> Arc<Self> {
        Self::new(call_id, None)
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase() == Phase::Ended
    }

    pub fn observers(&self) -> &ObserverHub {
        &self.observers
    }

    fn transition(&self, new_phase: Phase) {
        let mut inner = self.inner.lock();
        info!(call_id = %self.call_id, from = ?inner.phase, to = ?new_phase, "session phase transition");
        inner.phase = new_phase;
        inner.entered_at = Instant::now();
    }

    pub fn begin_configuring(&self, config: SessionConfig) {
        let mut inner = self.inner.lock();
        inner.config = config;
        inner.phase = Phase::Configuring;
        inner.entered_at = Instant::now();
    }

    pub fn mark_configured(&self) {
        self.transition(Phase::Ready);
    }

    /// Called when the telephony `start` frame is observed. Returns the
    /// early-audio frames buffered during Configuring/Ready, in arrival
    /// order, for the caller to replay into the AI pipeline.
    pub fn activate(&self) -> Vec<Vec<u8>> {
        let mut inner = self.inner.lock();
        inner.phase = Phase::Active;
        inner.entered_at = Instant::now();
        inner.early_audio_bytes = 0;
        inner.early_audio.drain(..).collect()
    }

    /// Buffer inbound µ-law bytes observed before `Active`, bounded at
    /// roughly 2 seconds of audio (§4.5 "Early audio"). Drops the oldest
    /// frame on overflow and emits a warning event.
    pub fn buffer_early_audio(&self, ulaw_frame: Vec<u8>) {
        const BYTES_PER_MS: usize = 8; // 8kHz * 1 byte / 1000ms
        let budget = EARLY_AUDIO_BUDGET_MS as usize * BYTES_PER_MS;
        let mut inner = self.inner.lock();
        inner.early_audio_bytes += ulaw_frame.len();
        inner.early_audio.push_back(ulaw_frame);
        while inner.early_audio_bytes > budget {
            if let Some(dropped) = inner.early_audio.pop_front() {
                inner.early_audio_bytes -= dropped.len();
                warn!(call_id = %self.call_id, "early audio buffer overflow, dropped oldest frame");
            } else {
                break;
            }
        }
    }

    pub fn check_state_timeout(&self) -> Option<EndReason> {
        let inner = self.inner.lock();
        let elapsed = inner.entered_at.elapsed();
        match inner.phase {
            Phase::Configuring if elapsed > CONFIGURING_TIMEOUT => {
                Some(EndReason::Timeout("Configuring"))
            }
            Phase::Ready if elapsed > READY_TO_ACTIVE_TIMEOUT => {
                Some(EndReason::Timeout("Ready"))
            }
            _ => None,
        }
    }

    pub fn next_inbound_frame_index(&self) -> i64 {
        self.inbound_frame_index.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_outbound_frame_index(&self) -> i64 {
        self.outbound_frame_index.fetch_add(1, Ordering::Relaxed)
    }

    pub fn is_user_speaking(&self) -> bool {
        self.user_speaking.load(Ordering::Relaxed)
    }

    pub fn is_assistant_speaking(&self) -> bool {
        self.assistant_speaking.load(Ordering::Relaxed)
    }

    /// Handles `input_audio_buffer.speech_started`. If the assistant is
    /// currently speaking, this is a barge-in: the caller must send a
    /// telephony `clear` and an AI `conversation.item.truncate`, in that
    /// order, within 50ms (§4.5 rule 4, §8 property 6).
    pub fn on_user_speech_started(&self) -> BargeInAction {
        self.user_speaking.store(true, Ordering::Relaxed);
        if !self.is_assistant_speaking() {
            return BargeInAction {
                send_clear: false,
                truncate_item_id: None,
                truncate_content_index: 0,
                truncate_audio_end_ms: 0,
            };
        }
        let inner = self.inner.lock();
        match &inner.current_response {
            Some(response) => BargeInAction {
                send_clear: true,
                truncate_item_id: Some(response.item_id.clone()),
                truncate_content_index: 0,
                truncate_audio_end_ms: response.first_delta_at.elapsed().as_millis() as i64,
            },
            None => BargeInAction {
                send_clear: true,
                truncate_item_id: None,
                truncate_content_index: 0,
                truncate_audio_end_ms: 0,
            },
        }
    }

    pub fn on_user_speech_stopped(&self) {
        self.user_speaking.store(false, Ordering::Relaxed);
    }

    /// Call on the first `response.audio.delta` of a new response.
    pub fn on_assistant_audio_started(&self, response_id: String, item_id: String) {
        self.assistant_speaking.store(true, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        if inner
            .current_response
            .as_ref()
            .is_none_or(|r| r.response_id != response_id)
        {
            inner.current_response = Some(AssistantResponse {
                response_id,
                item_id,
                first_delta_at: Instant::now(),
            });
        }
    }

    pub fn on_assistant_audio_done(&self) {
        self.assistant_speaking.store(false, Ordering::Relaxed);
        self.inner.lock().current_response = None;
    }

    pub fn append_assistant_transcript_delta(&self, delta: &str) {
        self.inner.lock().pending_assistant_transcript.push_str(delta);
    }

    pub fn finalize_assistant_transcript(&self, offset_ms: i64) -> TranscriptItem {
        let mut inner = self.inner.lock();
        let text = std::mem::take(&mut inner.pending_assistant_transcript);
        TranscriptItem::new(Speaker::Assistant, text, offset_ms, true)
    }

    pub fn finalize_user_transcript(&self, text: String, offset_ms: i64) -> TranscriptItem {
        TranscriptItem::new(Speaker::User, text, offset_ms, true)
    }

    /// Record an event into the bounded log and fan it out to observers.
    /// Never blocks on storage or observer I/O.
    pub fn record_event(&self, event_type: &str, direction: Direction, payload: serde_json::Value) {
        let event = Event::new(self.call_id.as_str(), event_type, direction, payload);
        {
            let mut inner = self.inner.lock();
            if inner.events.len() >= EVENT_LOG_CAPACITY {
                inner.events.pop_front();
            }
            inner.events.push_back(event.clone());
        }
        self.observers.broadcast(event.clone());
        if let Some(storage) = &self.storage {
            let storage = storage.clone();
            tokio::spawn(async move {
                if let Err(err) = storage.record_event(&event).await {
                    warn!(error = %err, "storage write failed for event, continuing");
                }
            });
        }
    }

    pub async fn record_transcript_item(&self, item: TranscriptItem) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.record_transcript_item(&item).await {
                warn!(error = %err, "storage write failed for transcript item, continuing");
            }
        }
    }

    #[cfg(feature = "recorder")]
    pub fn attach_recorder(&self, recorder: Recorder) {
        *self.recorder.lock() = Some(recorder);
    }

    #[cfg(feature = "recorder")]
    pub fn write_mixed_frame(&self, caller: &[i16], assistant: &[i16]) {
        if let Some(recorder) = self.recorder.lock().as_mut() {
            recorder.write_mixed_frame(caller, assistant);
        }
    }

    /// Runs the termination contract (§4.5 "Termination contract") except
    /// for the socket-closing and registry-removal steps, which the caller
    /// (who owns those resources) must perform immediately before and after
    /// calling this, respectively.
    pub async fn end(&self, reason: EndReason) {
        {
            let mut inner = self.inner.lock();
            if inner.phase == Phase::Ended {
                return;
            }
            inner.phase = Phase::Ended;
            inner.end_reason = Some(reason.clone());
        }
        self.record_event(
            "session.ended",
            Direction::Outgoing,
            serde_json::json!({ "reason": format!("{reason:?}") }),
        );

        #[cfg(feature = "recorder")]
        if let Some(recorder) = self.recorder.lock().take() {
            recorder.finalize();
        }

        if let Some(storage) = &self.storage {
            if let Err(err) = storage.flush().await {
                warn!(error = %err, "storage flush failed during termination, continuing");
            }
        }

        self.observers.detach_all();
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.inner.lock().end_reason.clone()
    }
}

impl From<BridgeError> for EndReason {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout { state, .. } => EndReason::Timeout(state),
            other => EndReason::Fatal(other.to_string()),
        }
    }
}

pub fn is_fatal_for_session(err: &BridgeError) -> bool {
    err.is_fatal()
}

pub type SessionResult<T> = BridgeResult<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn early_audio_is_replayed_in_order_on_activate() {
        let session = Session::new_for_test("CA1");
        session.buffer_early_audio(vec![1u8; 160]);
        session.buffer_early_audio(vec![2u8; 160]);
        let replayed = session.activate();
        assert_eq!(replayed, vec![vec![1u8; 160], vec![2u8; 160]]);
        assert_eq!(session.phase(), Phase::Active);
    }

    #[test]
    fn early_audio_buffer_drops_oldest_past_budget() {
        let session = Session::new_for_test("CA2");
        // 2s budget at 8 bytes/ms = 16000 bytes; push 200 * 160 = 32000 bytes.
        for i in 0..200u8 {
            session.buffer_early_audio(vec![i; 160]);
        }
        let replayed = session.activate();
        let total_bytes: usize = replayed.iter().map(|f| f.len()).sum();
        assert!(total_bytes <= 16_000);
        // oldest frames (lowest `i`) should have been dropped.
        assert_ne!(replayed.first().unwrap()[0], 0);
    }

    #[test]
    fn barge_in_is_a_noop_when_assistant_not_speaking() {
        let session = Session::new_for_test("CA3");
        let action = session.on_user_speech_started();
        assert!(!action.send_clear);
        assert!(action.truncate_item_id.is_none());
    }

    #[test]
    fn barge_in_emits_clear_and_truncate_with_item_id_when_assistant_speaking() {
        let session = Session::new_for_test("CA4");
        session.on_assistant_audio_started("resp_1".to_string(), "item_1".to_string());
        let action = session.on_user_speech_started();
        assert!(action.send_clear);
        assert_eq!(action.truncate_item_id.as_deref(), Some("item_1"));
    }

    #[test]
    fn user_and_assistant_speaking_can_overlap() {
        let session = Session::new_for_test("CA5");
        session.on_assistant_audio_started("resp_1".to_string(), "item_1".to_string());
        session.on_user_speech_started();
        assert!(session.is_user_speaking());
        assert!(session.is_assistant_speaking());
    }

    #[test]
    fn assistant_audio_done_clears_speaking_flag_and_response() {
        let session = Session::new_for_test("CA6");
        session.on_assistant_audio_started("resp_1".to_string(), "item_1".to_string());
        session.on_assistant_audio_done();
        assert!(!session.is_assistant_speaking());
    }

    #[test]
    fn assistant_transcript_accumulates_and_finalizes() {
        let session = Session::new_for_test("CA7");
        session.append_assistant_transcript_delta("hel");
        session.append_assistant_transcript_delta("lo");
        let item = session.finalize_assistant_transcript(500);
        assert_eq!(item.text, "hello");
        assert_eq!(item.speaker, Speaker::Assistant);
        // buffer is cleared after finalize
        let second = session.finalize_assistant_transcript(600);
        assert_eq!(second.text, "");
    }

    #[tokio::test]
    async fn ending_twice_is_idempotent() {
        let session = Session::new_for_test("CA8");
        session.end(EndReason::TelephonyStop).await;
        assert_eq!(session.phase(), Phase::Ended);
        session.end(EndReason::ExplicitEndRequest).await;
        assert_eq!(session.end_reason(), Some(EndReason::TelephonyStop));
    }

    #[test]
    fn inbound_frame_indices_are_monotonic() {
        let session = Session::new_for_test("CA9");
        assert_eq!(session.next_inbound_frame_index(), 0);
        assert_eq!(session.next_inbound_frame_index(), 1);
        assert_eq!(session.next_inbound_frame_index(), 2);
    }
}
