//! Accumulates variable-sized audio chunks into fixed-size output (§4.2).
//! Both modes are single-producer-single-consumer: the owning Session is the
//! only writer and the only reader, so neither type is `Sync`-guaranteed and
//! neither takes a lock.

/// Accumulates samples until a target duration's worth have arrived, then
/// hands the whole accumulation back on `flush` and resets to empty.
pub struct DurationTargetBuffer {
    target_samples: usize,
    samples: Vec<i16>,
}

impl DurationTargetBuffer {
    pub fn new(target_ms: u32, sample_rate_hz: u32) -> Self {
        let target_samples = (target_ms as u64 * sample_rate_hz as u64 / 1000) as usize;
        Self {
            target_samples,
            samples: Vec::with_capacity(target_samples),
        }
    }

    pub fn push(&mut self, chunk: &[i16]) {
        self.samples.extend_from_slice(chunk);
    }

    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.target_samples
    }

    /// Concatenates and clears the buffer regardless of readiness.
    pub fn flush(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.samples)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Accumulates samples and yields complete fixed-size chunks, retaining any
/// partial tail for the next push.
pub struct ChunkSplitter {
    target_samples: usize,
    pending: Vec<i16>,
}

impl ChunkSplitter {
    pub fn new(target_samples: usize) -> Self {
        Self {
            target_samples,
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, chunk: &[i16]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Drains every complete `target_samples`-sized chunk in arrival order,
    /// leaving any remainder shorter than `target_samples` in the buffer.
    pub fn drain_chunks(&mut self) -> Vec<Vec<i16>> {
        let complete = self.pending.len() / self.target_samples;
        let mut out = Vec::with_capacity(complete);
        for i in 0..complete {
            let start = i * self.target_samples;
            out.push(self.pending[start..start + self.target_samples].to_vec());
        }
        let tail_start = complete * self.target_samples;
        self.pending.drain(0..tail_start);
        out
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_target_buffer_becomes_ready_at_target() {
        let mut buf = DurationTargetBuffer::new(20, 24_000); // 480 samples
        buf.push(&vec![0i16; 479]);
        assert!(!buf.is_ready());
        buf.push(&[0i16]);
        assert!(buf.is_ready());
        let flushed = buf.flush();
        assert_eq!(flushed.len(), 480);
        assert!(buf.is_empty());
    }

    #[test]
    fn duration_target_buffer_flush_resets_state() {
        let mut buf = DurationTargetBuffer::new(20, 8_000); // 160 samples
        buf.push(&vec![1i16; 160]);
        let first = buf.flush();
        assert_eq!(first.len(), 160);
        assert_eq!(buf.len(), 0);
        buf.push(&vec![2i16; 10]);
        assert!(!buf.is_ready());
    }

    #[test]
    fn chunk_splitter_yields_only_complete_chunks() {
        let mut splitter = ChunkSplitter::new(160);
        splitter.push(&vec![7i16; 350]);
        let chunks = splitter.drain_chunks();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 160);
        assert_eq!(splitter.pending_len(), 30);
    }

    #[test]
    fn chunk_splitter_retains_tail_across_pushes() {
        let mut splitter = ChunkSplitter::new(100);
        splitter.push(&vec![1i16; 60]);
        assert!(splitter.drain_chunks().is_empty());
        splitter.push(&vec![2i16; 60]);
        let chunks = splitter.drain_chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(splitter.pending_len(), 20);
    }

    #[test]
    fn chunk_splitter_with_empty_input_yields_nothing() {
        let mut splitter = ChunkSplitter::new(160);
        assert!(splitter.drain_chunks().is_empty());
    }
}
