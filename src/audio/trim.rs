use crate::audio::silence::{detect_leading_silence, detect_silence};
use crate::error::{EmptyAudioReason, PreprocessError};
use crate::types::AudioSignal;

/// Removes head/tail silence and flattens interior silence to exact zeros.
///
/// Interior silences are replaced, not removed, so the timing of the voiced
/// spans is preserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceTrimmer {
    pub head_threshold_dbfs: f64,
    pub tail_threshold_dbfs: f64,
    pub chunk_ms: u64,
}

impl SilenceTrimmer {
    pub fn new(head_threshold_dbfs: f64, tail_threshold_dbfs: f64, chunk_ms: u64) -> Self {
        Self {
            head_threshold_dbfs,
            tail_threshold_dbfs,
            chunk_ms,
        }
    }

    pub fn trim(&self, signal: &AudioSignal) -> Result<AudioSignal, PreprocessError> {
        if signal.is_empty() {
            return Err(PreprocessError::empty_audio(EmptyAudioReason::EmptyInput));
        }
        if self.chunk_ms == 0 {
            return Err(PreprocessError::invalid_input("silence chunk size must be > 0"));
        }

        let head_ms = detect_leading_silence(signal, self.head_threshold_dbfs, self.chunk_ms);
        let reversed = AudioSignal::new(
            signal.samples.iter().rev().copied().collect(),
            signal.sample_rate_hz,
        );
        let tail_ms = detect_leading_silence(&reversed, self.tail_threshold_dbfs, self.chunk_ms);

        let end_ms = signal.duration_ms().saturating_sub(tail_ms);
        let cut = AudioSignal::new(
            signal.slice_ms(head_ms, end_ms).to_vec(),
            signal.sample_rate_hz,
        );
        let trimmed = self.zero_interior_silence(&cut);

        tracing::debug!(
            head_ms,
            tail_ms,
            input_samples = signal.len(),
            output_samples = trimmed.len(),
            "trim: removed leading/trailing silence"
        );

        if trimmed.is_empty() {
            return Err(PreprocessError::empty_audio(EmptyAudioReason::TrimmedAway));
        }
        Ok(trimmed)
    }

    fn zero_interior_silence(&self, signal: &AudioSignal) -> AudioSignal {
        let silences = detect_silence(signal, self.chunk_ms, self.tail_threshold_dbfs);
        if silences.is_empty() {
            return signal.clone();
        }

        let mut out = Vec::with_capacity(signal.len());
        let mut cursor = 0usize;
        for interval in &silences {
            let start = signal.ms_to_sample(interval.start).max(cursor);
            let end = signal.ms_to_sample(interval.end).max(start);
            out.extend_from_slice(&signal.samples[cursor..start]);
            out.resize(out.len() + (end - start), 0.0);
            cursor = end;
        }
        out.extend_from_slice(&signal.samples[cursor..]);

        AudioSignal::new(out, signal.sample_rate_hz)
    }
}
