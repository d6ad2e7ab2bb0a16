use ndarray::ArrayView2;

use crate::error::PreprocessError;
use crate::features::MelSpectrogram;

pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, samples: &[f32]) -> Result<MelSpectrogram, PreprocessError>;
}

pub trait PitchTracker: Send + Sync {
    /// One F0 value in Hz per spectrogram frame, `0.0` when unvoiced.
    fn estimate_f0(&self, samples: &[f32]) -> Result<Vec<f32>, PreprocessError>;
}

pub trait SequenceAligner: Send + Sync {
    fn align_durations(
        &self,
        target: ArrayView2<'_, f32>,
        source: ArrayView2<'_, f32>,
        silence_mask: Option<&[bool]>,
    ) -> Result<Vec<usize>, PreprocessError>;
}
