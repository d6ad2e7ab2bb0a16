use std::fmt;
use std::path::PathBuf;

use ndarray::{Array1, Array2};

/// Mono PCM signal normalized to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32) -> Self {
        Self {
            samples,
            sample_rate_hz,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in whole milliseconds, rounded like pydub's `len(segment)`.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate_hz == 0 {
            return 0;
        }
        (self.samples.len() as f64 * 1000.0 / self.sample_rate_hz as f64).round() as u64
    }

    /// Sample index of a millisecond offset, clamped to the signal length.
    pub fn ms_to_sample(&self, ms: u64) -> usize {
        let idx = (ms as u128 * self.sample_rate_hz as u128 / 1000) as usize;
        idx.min(self.samples.len())
    }

    /// Samples in the half-open millisecond window `[start_ms, end_ms)`.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> &[f32] {
        let start = self.ms_to_sample(start_ms);
        let end = self.ms_to_sample(end_ms).max(start);
        &self.samples[start..end]
    }
}

/// Half-open `[start, end)` interval; the unit (ms or frames) is given by context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceInterval {
    pub start: u64,
    pub end: u64,
}

impl SilenceInterval {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Frame-synchronous features of one utterance side.
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticFeatures {
    /// `(frames, n_mels)` log-mel spectrogram.
    pub mel: Array2<f32>,
    /// Log pitch per frame.
    pub pitch: Array1<f32>,
    /// Log energy per frame.
    pub energy: Array1<f32>,
}

impl AcousticFeatures {
    pub fn num_frames(&self) -> usize {
        self.mel.nrows()
    }
}

/// Per-sentence lengths, in pooled frames, on both sides of a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceDurations {
    pub source: Vec<usize>,
    pub target: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything computed for one utterance pair before anything is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PairFeatures {
    pub utt_id: String,
    pub source: AcousticFeatures,
    pub target: AcousticFeatures,
    /// One entry per pooled source frame; sums to the pooled target length.
    pub duration: Vec<usize>,
    pub sentence_durations: Option<SentenceDurations>,
}

/// A rejected utterance, with the side(s) to blame.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceFailure {
    pub utt_id: String,
    /// `None` when the whole pair was rejected.
    pub side: Option<Side>,
    pub source_wav: PathBuf,
    pub target_wav: PathBuf,
    pub message: String,
}

impl UtteranceFailure {
    pub fn blames_source(&self) -> bool {
        self.side != Some(Side::Target)
    }

    pub fn blames_target(&self) -> bool {
        self.side != Some(Side::Source)
    }
}

/// Result of processing one pair inside the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Written { utt_id: String },
    Failed(UtteranceFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_slicing_follows_sample_rate() {
        let signal = AudioSignal::new(vec![0.0; 16_000], 16_000);
        assert_eq!(signal.duration_ms(), 1000);
        assert_eq!(signal.ms_to_sample(10), 160);
        assert_eq!(signal.slice_ms(10, 20).len(), 160);
        assert_eq!(signal.slice_ms(990, 2000).len(), 160);
        assert!(signal.slice_ms(2000, 3000).is_empty());
    }

    #[test]
    fn pair_failure_blames_both_lists() {
        let failure = UtteranceFailure {
            utt_id: "utt".to_string(),
            side: None,
            source_wav: PathBuf::from("src/utt.wav"),
            target_wav: PathBuf::from("tgt/utt.wav"),
            message: "sum mismatch".to_string(),
        };
        assert!(failure.blames_source());
        assert!(failure.blames_target());

        let source_only = UtteranceFailure {
            side: Some(Side::Source),
            ..failure
        };
        assert!(source_only.blames_source());
        assert!(!source_only.blames_target());
    }
}
