use ndarray::ArrayView2;

use crate::alignment::DurationAligner;
use crate::error::PreprocessError;
use crate::features::{AutocorrelationPitchTracker, LogMelExtractor, MelSpectrogram};
use crate::pipeline::traits::{FeatureExtractor, PitchTracker, SequenceAligner};

impl FeatureExtractor for LogMelExtractor {
    fn extract(&self, samples: &[f32]) -> Result<MelSpectrogram, PreprocessError> {
        Ok(self.compute(samples))
    }
}

impl PitchTracker for AutocorrelationPitchTracker {
    fn estimate_f0(&self, samples: &[f32]) -> Result<Vec<f32>, PreprocessError> {
        Ok(self.track(samples))
    }
}

/// DTW duration extraction with the configured band.
pub struct DtwSequenceAligner {
    aligner: DurationAligner,
}

impl DtwSequenceAligner {
    pub fn new(band: Option<usize>) -> Self {
        Self {
            aligner: DurationAligner::new(band),
        }
    }
}

impl SequenceAligner for DtwSequenceAligner {
    fn align_durations(
        &self,
        target: ArrayView2<'_, f32>,
        source: ArrayView2<'_, f32>,
        silence_mask: Option<&[bool]>,
    ) -> Result<Vec<usize>, PreprocessError> {
        self.aligner.align(target, source, silence_mask)
    }
}
