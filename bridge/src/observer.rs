use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use protocol::Event;
use tokio::sync::mpsc;
use tracing::warn;

const OBSERVER_QUEUE_DEPTH: usize = 64;
const MAX_CONSECUTIVE_OVERFLOWS: u32 = 8;

struct Observer {
    sender: mpsc::Sender<Event>,
    consecutive_overflows: AtomicU32,
}

/// Per-session fan-out to observer WebSockets (§4.7). Broadcast is
/// best-effort: a full queue drops the oldest entry rather than blocking
/// audio bridging, and an observer that overflows repeatedly is dropped.
#[derive(Default)]
pub struct ObserverHub {
    observers: Mutex<Vec<Observer>>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new observer, returning the receiving half of its queue.
    pub fn attach(&self) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(OBSERVER_QUEUE_DEPTH);
        self.observers.lock().push(Observer {
            sender: tx,
            consecutive_overflows: AtomicU32::new(0),
        });
        rx
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Push `event` to every attached observer, dropping the oldest queued
    /// event for any observer whose queue is full and disconnecting any
    /// observer that overflows too many times in a row.
    pub fn broadcast(&self, event: Event) {
        let mut observers = self.observers.lock();
        observers.retain(|observer| match observer.sender.try_send(event.clone()) {
            Ok(()) => {
                observer.consecutive_overflows.store(0, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let overflows = observer.consecutive_overflows.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(overflows, "observer queue full, dropping event");
                overflows < MAX_CONSECUTIVE_OVERFLOWS
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Detach everyone, closing their channels so observer tasks can exit.
    pub fn detach_all(&self) {
        self.observers.lock().clear();
    }
}
