use async_trait::async_trait;
use protocol::{Event, TranscriptItem};

use crate::error::BridgeResult;

/// The seam a real persistence layer would plug into. Storage itself is out
/// of scope here; `NullSink` is what the bridge runs with today.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn record_event(&self, event: &Event) -> BridgeResult<()>;
    async fn record_transcript_item(&self, item: &TranscriptItem) -> BridgeResult<()>;
    async fn flush(&self) -> BridgeResult<()>;
}

#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl StorageSink for NullSink {
    async fn record_event(&self, _event: &Event) -> BridgeResult<()> {
        Ok(())
    }

    async fn record_transcript_item(&self, _item: &TranscriptItem) -> BridgeResult<()> {
        Ok(())
    }

    async fn flush(&self) -> BridgeResult<()> {
        Ok(())
    }
}
