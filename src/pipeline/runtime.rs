use std::path::Path;

use ndarray::Array1;
use thiserror::Error;

use crate::alignment::SentenceSegmenter;
use crate::audio::{detect_silence, read_wav_mono, resample, SilenceTrimmer};
use crate::config::PreprocessConfig;
use crate::error::PreprocessError;
use crate::features::continuity::voiced_frame_count;
use crate::features::{
    log_with_floor, FramePooler, PitchContinuityFilter, LOG_EPS, VOICE_ACTIVITY_LOG_ENERGY,
};
use crate::pipeline::traits::{FeatureExtractor, PitchTracker, SequenceAligner};
use crate::types::{AcousticFeatures, AudioSignal, PairFeatures, SentenceDurations, Side};

/// A rejected pair, blamed on one side or (with `side == None`) on both.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PairError {
    pub side: Option<Side>,
    #[source]
    pub error: PreprocessError,
}

impl PairError {
    pub fn pair(error: PreprocessError) -> Self {
        Self { side: None, error }
    }

    /// Blames `side` for side-local errors and the whole pair otherwise.
    pub fn on(side: Side, error: PreprocessError) -> Self {
        let side = error.is_side_local().then_some(side);
        Self { side, error }
    }
}

pub struct Preprocessor {
    config: PreprocessConfig,
    trimmer: SilenceTrimmer,
    feature_extractor: Box<dyn FeatureExtractor>,
    duration_extractor: Box<dyn FeatureExtractor>,
    pitch_tracker: Box<dyn PitchTracker>,
    sequence_aligner: Box<dyn SequenceAligner>,
    pooler: FramePooler,
    continuity: Option<PitchContinuityFilter>,
    segmenter: Option<SentenceSegmenter>,
}

pub(crate) struct PreprocessorParts {
    pub config: PreprocessConfig,
    pub trimmer: SilenceTrimmer,
    pub feature_extractor: Box<dyn FeatureExtractor>,
    pub duration_extractor: Box<dyn FeatureExtractor>,
    pub pitch_tracker: Box<dyn PitchTracker>,
    pub sequence_aligner: Box<dyn SequenceAligner>,
    pub pooler: FramePooler,
    pub continuity: Option<PitchContinuityFilter>,
    pub segmenter: Option<SentenceSegmenter>,
}

impl Preprocessor {
    pub(crate) fn from_parts(parts: PreprocessorParts) -> Self {
        Self {
            config: parts.config,
            trimmer: parts.trimmer,
            feature_extractor: parts.feature_extractor,
            duration_extractor: parts.duration_extractor,
            pitch_tracker: parts.pitch_tracker,
            sequence_aligner: parts.sequence_aligner,
            pooler: parts.pooler,
            continuity: parts.continuity,
            segmenter: parts.segmenter,
        }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Decodes both recordings and computes every output array of the pair.
    pub fn process_pair(
        &self,
        utt_id: &str,
        source_wav: &Path,
        target_wav: &Path,
    ) -> Result<PairFeatures, PairError> {
        if source_wav.file_stem() != target_wav.file_stem() {
            return Err(PairError::pair(PreprocessError::invalid_input(format!(
                "source and target stems differ: {} vs {}",
                source_wav.display(),
                target_wav.display()
            ))));
        }
        let source = read_wav_mono(source_wav).map_err(PairError::pair)?;
        let target = read_wav_mono(target_wav).map_err(PairError::pair)?;
        self.analyse_pair(utt_id, &source, &target)
    }

    /// Same as [`Self::process_pair`] on already decoded signals.
    pub fn analyse_pair(
        &self,
        utt_id: &str,
        source: &AudioSignal,
        target: &AudioSignal,
    ) -> Result<PairFeatures, PairError> {
        let (source, target) = match (self.trimmer.trim(source), self.trimmer.trim(target)) {
            (Ok(source), Ok(target)) => (source, target),
            (Err(error), Ok(_)) => return Err(PairError::on(Side::Source, error)),
            (Ok(_), Err(error)) => return Err(PairError::on(Side::Target, error)),
            (Err(error), Err(_)) => return Err(PairError::pair(error)),
        };

        let rate = self.config.sample_rate;
        let source = resample(&source, rate).map_err(PairError::pair)?;
        let target = resample(&target, rate).map_err(PairError::pair)?;

        let source_features = self
            .analyse_side(&source)
            .map_err(|e| PairError::on(Side::Source, e))?;
        let target_features = self
            .analyse_side(&target)
            .map_err(|e| PairError::on(Side::Target, e))?;

        let (duration, target_len) = self
            .compute_durations(&source, &target)
            .map_err(PairError::pair)?;
        let sentence_durations = self
            .compute_sentence_durations(&target, &duration, target_len)
            .map_err(PairError::pair)?;

        tracing::debug!(
            utt_id,
            source_frames = source_features.num_frames(),
            target_frames = target_features.num_frames(),
            pooled_source = duration.len(),
            pooled_target = target_len,
            "runtime: analysed pair"
        );

        Ok(PairFeatures {
            utt_id: utt_id.to_string(),
            source: source_features,
            target: target_features,
            duration,
            sentence_durations,
        })
    }

    /// Log-mel, log-pitch and log-energy of one trimmed, resampled side.
    pub fn analyse_side(&self, signal: &AudioSignal) -> Result<AcousticFeatures, PreprocessError> {
        let spectrogram = self.feature_extractor.extract(&signal.samples)?;
        let raw_pitch = self.pitch_tracker.estimate_f0(&signal.samples)?;

        let voiced_frames = voiced_frame_count(&raw_pitch);
        if voiced_frames <= 1 {
            return Err(PreprocessError::InsufficientVoicing { voiced_frames });
        }
        let frames = spectrogram.mel.nrows();
        if raw_pitch.len() != frames {
            return Err(PreprocessError::invalid_input(format!(
                "pitch track has {} frames for {frames} spectrogram frames",
                raw_pitch.len()
            )));
        }

        let energy = log_with_floor(&spectrogram.energy.to_vec());
        let pitch = match &self.continuity {
            Some(filter) => filter.apply(&raw_pitch, Some(&energy)).ok_or_else(|| {
                PreprocessError::InsufficientVoicing {
                    voiced_frames: voiced_frame_count(&filter.gate(&raw_pitch, Some(&energy))),
                }
            })?,
            None => raw_pitch,
        };

        Ok(AcousticFeatures {
            mel: spectrogram.mel,
            pitch: Array1::from(log_with_floor(&pitch)),
            energy: Array1::from(energy),
        })
    }

    /// Pooled source durations and the pooled target length.
    fn compute_durations(
        &self,
        source: &AudioSignal,
        target: &AudioSignal,
    ) -> Result<(Vec<usize>, usize), PreprocessError> {
        let source_spec = self.duration_extractor.extract(&source.samples)?;
        let target_spec = self.duration_extractor.extract(&target.samples)?;

        let source_mel = self.pooler.pool_2d(source_spec.mel.view());
        let target_mel = self.pooler.pool_2d(target_spec.mel.view());
        let source_energy = self.pooler.pool_1d(source_spec.energy.view());
        let silence_mask: Vec<bool> = source_energy
            .iter()
            .map(|&e| (e + LOG_EPS).ln() < VOICE_ACTIVITY_LOG_ENERGY)
            .collect();

        let duration = self.sequence_aligner.align_durations(
            target_mel.view(),
            source_mel.view(),
            Some(&silence_mask),
        )?;
        Ok((duration, target_mel.nrows()))
    }

    fn compute_sentence_durations(
        &self,
        target: &AudioSignal,
        duration: &[usize],
        target_len: usize,
    ) -> Result<Option<SentenceDurations>, PreprocessError> {
        let Some(segmenter) = &self.segmenter else {
            return Ok(None);
        };
        let silences = detect_silence(
            target,
            u64::from(self.config.min_silence_len),
            f64::from(self.config.silence_thresh_t),
        );
        segmenter
            .segment(duration, target_len, &silences)
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmptyAudioReason;
    use crate::pipeline::builder::PreprocessorBuilder;

    const SR: u32 = 16_000;

    fn config() -> PreprocessConfig {
        PreprocessConfig {
            sample_rate: SR,
            filter_length: 512,
            hop_length: 160,
            win_length: 400,
            n_mel_channels: 40,
            mel_fmax: 8_000.0,
            ..PreprocessConfig::default()
        }
    }

    fn voiced(freq: f32, seconds: f32) -> Vec<f32> {
        let n = (SR as f32 * seconds) as usize;
        (0..n)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32;
                0.3 * phase.sin() + 0.15 * (2.0 * phase).sin() + 0.05 * (3.0 * phase).sin()
            })
            .collect()
    }

    fn noise(seconds: f32) -> Vec<f32> {
        let n = (SR as f32 * seconds) as usize;
        let mut state = 0x2545_f491_u32;
        (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32 - 0.5) * 0.6
            })
            .collect()
    }

    fn preprocessor(config: PreprocessConfig) -> Preprocessor {
        PreprocessorBuilder::new(config).build().unwrap()
    }

    #[test]
    fn analyses_voiced_pair() {
        let source = AudioSignal::new(voiced(150.0, 0.8), SR);
        let target = AudioSignal::new(voiced(220.0, 1.0), SR);
        let out = preprocessor(config())
            .analyse_pair("utt", &source, &target)
            .unwrap();

        assert_eq!(out.source.mel.ncols(), 40);
        assert_eq!(out.source.pitch.len(), out.source.num_frames());
        assert_eq!(out.target.energy.len(), out.target.num_frames());
        assert_eq!(out.duration.len(), out.source.num_frames());
        assert_eq!(out.duration.iter().sum::<usize>(), out.target.num_frames());
        assert!(out.sentence_durations.is_none());
        assert!(out.source.pitch.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn reduction_factor_pools_duration_axis() {
        let cfg = PreprocessConfig {
            reduction_factor: 2,
            ..config()
        };
        let source = AudioSignal::new(voiced(150.0, 0.8), SR);
        let target = AudioSignal::new(voiced(220.0, 1.0), SR);
        let out = preprocessor(cfg).analyse_pair("utt", &source, &target).unwrap();
        assert_eq!(out.duration.len(), out.source.num_frames() / 2);
        assert_eq!(out.duration.iter().sum::<usize>(), out.target.num_frames() / 2);
    }

    #[test]
    fn unvoiced_source_is_blamed_on_source() {
        let source = AudioSignal::new(noise(0.5), SR);
        let target = AudioSignal::new(voiced(220.0, 0.5), SR);
        let err = preprocessor(config())
            .analyse_pair("utt", &source, &target)
            .unwrap_err();
        assert_eq!(err.side, Some(Side::Source));
        assert!(matches!(err.error, PreprocessError::InsufficientVoicing { .. }));
    }

    #[test]
    fn silent_target_is_blamed_on_target() {
        let source = AudioSignal::new(voiced(150.0, 0.5), SR);
        let target = AudioSignal::new(vec![0.0; 8_000], SR);
        let err = preprocessor(config())
            .analyse_pair("utt", &source, &target)
            .unwrap_err();
        assert_eq!(err.side, Some(Side::Target));
        assert!(matches!(
            err.error,
            PreprocessError::EmptyAudio {
                reason: EmptyAudioReason::TrimmedAway
            }
        ));
    }

    #[test]
    fn both_sides_empty_blames_pair() {
        let empty = AudioSignal::new(Vec::new(), SR);
        let err = preprocessor(config())
            .analyse_pair("utt", &empty, &empty)
            .unwrap_err();
        assert_eq!(err.side, None);
    }

    #[test]
    fn sentence_durations_cover_both_sides() {
        let cfg = PreprocessConfig {
            sentence_duration: true,
            min_silence_len: 150,
            ..config()
        };
        let mut target = voiced(220.0, 0.6);
        target.extend(vec![0.0; 4_800]);
        target.extend(voiced(200.0, 0.6));
        let mut source = voiced(150.0, 0.5);
        source.extend(vec![0.0; 4_000]);
        source.extend(voiced(140.0, 0.5));

        let out = preprocessor(cfg)
            .analyse_pair(
                "utt",
                &AudioSignal::new(source, SR),
                &AudioSignal::new(target, SR),
            )
            .unwrap();
        let sentences = out.sentence_durations.expect("sentence durations enabled");
        assert_eq!(sentences.source.len(), sentences.target.len());
        assert_eq!(sentences.target.len(), 2);
        assert_eq!(sentences.source.iter().sum::<usize>(), out.duration.len());
        assert_eq!(
            sentences.target.iter().sum::<usize>(),
            out.duration.iter().sum::<usize>()
        );
    }

    #[test]
    fn mismatched_stems_are_rejected() {
        let err = preprocessor(config())
            .process_pair("a", Path::new("src/a.wav"), Path::new("tgt/b.wav"))
            .unwrap_err();
        assert_eq!(err.side, None);
        assert!(matches!(err.error, PreprocessError::InvalidInput { .. }));
    }
}
