use thiserror::Error;

/// The bridge's error taxonomy. Every variant maps to one of the six
/// categories a Session must reason about when deciding whether to continue,
/// retry, or terminate.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("transport failure on {transport}: {source}")]
    TransportFailure {
        transport: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("timeout waiting for {state} after {elapsed_ms}ms")]
    Timeout { state: &'static str, elapsed_ms: u64 },

    #[error("backpressure overflow on {queue}, dropped oldest entry")]
    BackpressureOverflow { queue: &'static str },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl BridgeError {
    /// Whether this error, left unhandled, must terminate the owning Session.
    /// `BackpressureOverflow` and `ProtocolViolation` are explicitly excluded:
    /// both are logged and survived, a dropped frame or skipped message never
    /// ends the call on their own.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            BridgeError::BackpressureOverflow { .. } | BridgeError::ProtocolViolation(_)
        )
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
