use crate::alignment::SentenceSegmenter;
use crate::audio::SilenceTrimmer;
use crate::config::PreprocessConfig;
use crate::error::PreprocessError;
use crate::features::{
    AutocorrelationPitchTracker, FramePooler, LogMelExtractor, MelParams, PitchContinuityFilter,
};
use crate::pipeline::defaults::DtwSequenceAligner;
use crate::pipeline::runtime::{Preprocessor, PreprocessorParts};
use crate::pipeline::traits::{FeatureExtractor, PitchTracker, SequenceAligner};

pub struct PreprocessorBuilder {
    config: PreprocessConfig,
    feature_extractor: Option<Box<dyn FeatureExtractor>>,
    duration_extractor: Option<Box<dyn FeatureExtractor>>,
    pitch_tracker: Option<Box<dyn PitchTracker>>,
    sequence_aligner: Option<Box<dyn SequenceAligner>>,
}

impl PreprocessorBuilder {
    pub fn new(config: PreprocessConfig) -> Self {
        Self {
            config,
            feature_extractor: None,
            duration_extractor: None,
            pitch_tracker: None,
            sequence_aligner: None,
        }
    }

    pub fn with_feature_extractor(mut self, feature_extractor: Box<dyn FeatureExtractor>) -> Self {
        self.feature_extractor = Some(feature_extractor);
        self
    }

    pub fn with_duration_extractor(
        mut self,
        duration_extractor: Box<dyn FeatureExtractor>,
    ) -> Self {
        self.duration_extractor = Some(duration_extractor);
        self
    }

    pub fn with_pitch_tracker(mut self, pitch_tracker: Box<dyn PitchTracker>) -> Self {
        self.pitch_tracker = Some(pitch_tracker);
        self
    }

    pub fn with_sequence_aligner(mut self, sequence_aligner: Box<dyn SequenceAligner>) -> Self {
        self.sequence_aligner = Some(sequence_aligner);
        self
    }

    pub fn build(self) -> Result<Preprocessor, PreprocessError> {
        let config = self.config;
        config.validate()?;

        let feature_extractor = match self.feature_extractor {
            Some(extractor) => extractor,
            None => Box::new(LogMelExtractor::new(MelParams::from_config(&config))?),
        };
        let duration_extractor = match self.duration_extractor {
            Some(extractor) => extractor,
            None => Box::new(LogMelExtractor::new(MelParams::for_duration(&config))?),
        };
        let pitch_tracker = match self.pitch_tracker {
            Some(tracker) => tracker,
            None => Box::new(AutocorrelationPitchTracker::from_config(&config)?),
        };
        let sequence_aligner = self
            .sequence_aligner
            .unwrap_or_else(|| Box::new(DtwSequenceAligner::new(config.dtw_band)));

        let trimmer = SilenceTrimmer::new(
            f64::from(config.silence_thresh_h),
            f64::from(config.silence_thresh_t),
            u64::from(config.chunk_size),
        );
        let pooler = FramePooler::new(config.reduction_factor)?;
        let continuity = config
            .is_continuous_pitch
            .then(PitchContinuityFilter::default);
        let segmenter = config.sentence_duration.then(|| {
            SentenceSegmenter::new(config.sample_rate, config.hop_length, config.reduction_factor)
        });

        Ok(Preprocessor::from_parts(PreprocessorParts {
            config,
            trimmer,
            feature_extractor,
            duration_extractor,
            pitch_tracker,
            sequence_aligner,
            pooler,
            continuity,
            segmenter,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::MelSpectrogram;
    use ndarray::{Array1, Array2};

    struct FlatExtractor;

    impl FeatureExtractor for FlatExtractor {
        fn extract(&self, samples: &[f32]) -> Result<MelSpectrogram, PreprocessError> {
            let frames = samples.len() / 256 + 1;
            Ok(MelSpectrogram {
                mel: Array2::zeros((frames, 4)),
                energy: Array1::ones(frames),
            })
        }
    }

    struct SteadyPitch;

    impl PitchTracker for SteadyPitch {
        fn estimate_f0(&self, samples: &[f32]) -> Result<Vec<f32>, PreprocessError> {
            Ok(vec![120.0; samples.len() / 256 + 1])
        }
    }

    #[test]
    fn builds_with_default_components() {
        let preprocessor = PreprocessorBuilder::new(PreprocessConfig::default())
            .build()
            .expect("default config should build");
        assert_eq!(preprocessor.config().sample_rate, 22_050);
    }

    #[test]
    fn invalid_config_fails_to_build() {
        let config = PreprocessConfig {
            reduction_factor: 0,
            ..PreprocessConfig::default()
        };
        assert!(PreprocessorBuilder::new(config).build().is_err());
    }

    #[test]
    fn custom_extractor_and_pitch_tracker_are_used() {
        let preprocessor = PreprocessorBuilder::new(PreprocessConfig::default())
            .with_feature_extractor(Box::new(FlatExtractor))
            .with_pitch_tracker(Box::new(SteadyPitch))
            .build()
            .unwrap();
        let signal = crate::types::AudioSignal::new(vec![0.0; 1_024], 22_050);
        let features = preprocessor.analyse_side(&signal).unwrap();

        assert_eq!(features.mel.dim(), (1_024 / 256 + 1, 4));
        assert!(features.mel.iter().all(|&v| v == 0.0));
        let log_f0 = (120.0f32 + 1e-6).ln();
        assert!(features.pitch.iter().all(|&p| (p - log_f0).abs() < 1e-5));
    }

    #[test]
    fn default_pitch_tracker_rejects_silence() {
        let preprocessor = PreprocessorBuilder::new(PreprocessConfig::default())
            .with_feature_extractor(Box::new(FlatExtractor))
            .build()
            .unwrap();
        let signal = crate::types::AudioSignal::new(vec![0.0; 1_024], 22_050);
        let err = preprocessor.analyse_side(&signal).unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::InsufficientVoicing { voiced_frames: 0 }
        ));
    }
}
