use std::fmt;

use thiserror::Error;

/// Why an audio side was considered empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyAudioReason {
    /// The decoded recording has no samples at all.
    EmptyInput,
    /// The recording had samples but head/tail trimming removed all of them.
    TrimmedAway,
}

impl fmt::Display for EmptyAudioReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => f.write_str("recording is empty"),
            Self::TrimmedAway => f.write_str("entire recording was trimmed as silence"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("WAV error while {context}: {source}")]
    Wav {
        context: &'static str,
        #[source]
        source: hound::Error,
    },
    #[error("npy write error while {context}: {source}")]
    Npy {
        context: &'static str,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("resampling failed: {message}")]
    Resample { message: String },
    #[error("empty audio: {reason}")]
    EmptyAudio { reason: EmptyAudioReason },
    #[error("insufficient voicing: {voiced_frames} voiced pitch frame(s), at least 2 required")]
    InsufficientVoicing { voiced_frames: usize },
    #[error("alignment invariant violated: {message}")]
    AlignmentInvariant { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("worker pool error: {message}")]
    WorkerPool { message: String },
}

impl PreprocessError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn wav(context: &'static str, source: hound::Error) -> Self {
        Self::Wav { context, source }
    }

    pub(crate) fn npy(context: &'static str, source: ndarray_npy::WriteNpyError) -> Self {
        Self::Npy { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn resample(err: impl fmt::Display) -> Self {
        Self::Resample {
            message: err.to_string(),
        }
    }

    pub(crate) fn empty_audio(reason: EmptyAudioReason) -> Self {
        Self::EmptyAudio { reason }
    }

    pub(crate) fn alignment_invariant(message: impl Into<String>) -> Self {
        Self::AlignmentInvariant {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn worker_pool(err: impl fmt::Display) -> Self {
        Self::WorkerPool {
            message: err.to_string(),
        }
    }

    /// Errors that reject only one side of a pair; everything else rejects the pair.
    pub fn is_side_local(&self) -> bool {
        matches!(
            self,
            Self::EmptyAudio { .. } | Self::InsufficientVoicing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_audio_reasons_are_distinguishable() {
        let empty = PreprocessError::empty_audio(EmptyAudioReason::EmptyInput).to_string();
        let trimmed = PreprocessError::empty_audio(EmptyAudioReason::TrimmedAway).to_string();
        assert_ne!(empty, trimmed);
        assert!(empty.contains("recording is empty"));
        assert!(trimmed.contains("trimmed"));
    }

    #[test]
    fn side_locality() {
        assert!(PreprocessError::InsufficientVoicing { voiced_frames: 1 }.is_side_local());
        assert!(PreprocessError::empty_audio(EmptyAudioReason::EmptyInput).is_side_local());
        assert!(!PreprocessError::alignment_invariant("sum").is_side_local());
        assert!(!PreprocessError::invalid_input("stem").is_side_local());
    }
}
