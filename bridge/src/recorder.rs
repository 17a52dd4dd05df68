use std::path::Path;

use tracing::warn;

/// Interleaved mixed-PCM16 24 kHz mono WAV recorder (§4.8). Mixing is a
/// clipped sum of whichever sides have audio for a given 20 ms slot; header
/// lengths are backfilled by `hound` when the writer is finalised. A failure
/// anywhere in here must never propagate up into the owning Session.
pub struct Recorder {
    writer: Option<hound::WavWriter<std::io::BufWriter<std::fs::File>>>,
}

const SAMPLE_RATE: u32 = 24_000;

impl Recorder {
    pub fn create(path: impl AsRef<Path>) -> Option<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        match hound::WavWriter::create(path.as_ref(), spec) {
            Ok(writer) => Some(Self {
                writer: Some(writer),
            }),
            Err(err) => {
                warn!(path = %path.as_ref().display(), error = %err, "failed to open recording file");
                None
            }
        }
    }

    /// Mixes `caller` and `assistant` (either may be empty for a silent side)
    /// and appends the clipped sum as one 20 ms slot.
    pub fn write_mixed_frame(&mut self, caller: &[i16], assistant: &[i16]) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let len = caller.len().max(assistant.len());
        for i in 0..len {
            let a = caller.get(i).copied().unwrap_or(0) as i32;
            let b = assistant.get(i).copied().unwrap_or(0) as i32;
            let mixed = (a + b).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            if let Err(err) = writer.write_sample(mixed) {
                warn!(error = %err, "failed to write recording sample, dropping remainder of frame");
                return;
            }
        }
    }

    /// Backfills the WAV header with the now-known length. Errors are
    /// logged, never propagated.
    pub fn finalize(mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.finalize() {
                warn!(error = %err, "failed to finalize recording");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_finalize_produces_a_readable_wav_file() {
        let dir = std::env::temp_dir().join(format!("bridge-recorder-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("call.wav");

        let mut recorder = Recorder::create(&path).expect("recorder should open");
        recorder.write_mixed_frame(&[100, 200, 300], &[10, 20, 30]);
        recorder.write_mixed_frame(&[], &[5, 5]);
        recorder.finalize();

        let reader = hound::WavReader::open(&path).expect("file should be a valid wav");
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.channels, 1);

        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![110, 220, 330, 5, 5]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn create_at_an_unwritable_path_returns_none_rather_than_panicking() {
        let recorder = Recorder::create("/nonexistent-dir-for-test/call.wav");
        assert!(recorder.is_none());
    }
}
