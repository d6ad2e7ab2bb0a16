use crate::config::PreprocessConfig;
use crate::error::PreprocessError;
use crate::features::num_frames;

/// Minimum normalized autocorrelation peak for a frame to count as voiced.
const DEFAULT_VOICING_THRESHOLD: f32 = 0.45;
/// Frames quieter than this RMS are unvoiced without further analysis.
const DEFAULT_SILENCE_RMS: f32 = 1e-3;
/// Earlier peaks within this ratio of the best peak win over later ones.
const OCTAVE_PEAK_RATIO: f32 = 0.9;

/// Frame-synchronous F0 estimator using normalized autocorrelation.
///
/// Produces one value per hop, aligned with the centered STFT frames, and
/// reports `0.0` for unvoiced frames.
#[derive(Debug, Clone, PartialEq)]
pub struct AutocorrelationPitchTracker {
    pub sample_rate: u32,
    pub hop_length: usize,
    pub f0_floor: f32,
    pub f0_ceil: f32,
    pub voicing_threshold: f32,
    pub silence_rms: f32,
}

impl AutocorrelationPitchTracker {
    pub fn new(
        sample_rate: u32,
        hop_length: usize,
        f0_floor: f32,
        f0_ceil: f32,
    ) -> Result<Self, PreprocessError> {
        if sample_rate == 0 || hop_length == 0 {
            return Err(PreprocessError::invalid_input(
                "pitch tracker needs sample_rate > 0 and hop_length > 0",
            ));
        }
        if !(f0_floor > 0.0 && f0_floor < f0_ceil) {
            return Err(PreprocessError::invalid_input(format!(
                "pitch range must satisfy 0 < floor < ceil, got {f0_floor}..{f0_ceil}"
            )));
        }
        Ok(Self {
            sample_rate,
            hop_length,
            f0_floor,
            f0_ceil,
            voicing_threshold: DEFAULT_VOICING_THRESHOLD,
            silence_rms: DEFAULT_SILENCE_RMS,
        })
    }

    pub fn from_config(config: &PreprocessConfig) -> Result<Self, PreprocessError> {
        Self::new(
            config.sample_rate,
            config.hop_length,
            config.f0_floor,
            config.f0_ceil,
        )
    }

    fn lag_range(&self) -> (usize, usize) {
        let sr = self.sample_rate as f32;
        let min_lag = ((sr / self.f0_ceil).floor() as usize).max(2);
        let max_lag = ((sr / self.f0_floor).ceil() as usize).max(min_lag + 1);
        (min_lag, max_lag)
    }

    pub fn track(&self, samples: &[f32]) -> Vec<f32> {
        let frames = num_frames(samples.len(), self.hop_length);
        let (min_lag, max_lag) = self.lag_range();
        let window_len = 2 * max_lag;
        let half = window_len / 2;

        let mut window = vec![0.0f32; window_len];
        let mut f0 = Vec::with_capacity(frames);
        for t in 0..frames {
            let center = t * self.hop_length;
            for (i, slot) in window.iter_mut().enumerate() {
                *slot = (center + i)
                    .checked_sub(half)
                    .and_then(|idx| samples.get(idx))
                    .copied()
                    .unwrap_or(0.0);
            }
            f0.push(self.estimate_frame(&mut window, min_lag, max_lag));
        }

        tracing::debug!(
            frames,
            voiced = f0.iter().filter(|&&v| v > 0.0).count(),
            "pitch: tracked f0 contour"
        );
        f0
    }

    fn estimate_frame(&self, frame: &mut [f32], min_lag: usize, max_lag: usize) -> f32 {
        let n = frame.len();
        let mean = frame.iter().sum::<f32>() / n as f32;
        frame.iter_mut().for_each(|x| *x -= mean);

        let energy = frame.iter().map(|x| x * x).sum::<f32>();
        if (energy / n as f32).sqrt() < self.silence_rms {
            return 0.0;
        }

        let max_lag = max_lag.min(n - 1);
        if min_lag >= max_lag {
            return 0.0;
        }
        let scores: Vec<f32> = (min_lag - 1..=max_lag)
            .map(|lag| normalized_autocorrelation(frame, lag))
            .collect();

        // scores[0] and scores[last] pad the searchable lags for interpolation
        let inner = 1..scores.len() - 1;
        let best_score = scores[inner.clone()]
            .iter()
            .copied()
            .fold(f32::MIN, f32::max);
        if best_score < self.voicing_threshold {
            return 0.0;
        }
        // first local peak close to the global best avoids octave errors
        let Some(best_offset) = inner.clone().find(|&i| {
            scores[i] >= OCTAVE_PEAK_RATIO * best_score
                && scores[i] >= scores[i - 1]
                && scores[i] >= scores[i + 1]
        }) else {
            return 0.0;
        };

        let (left, mid, right) = (
            scores[best_offset - 1],
            scores[best_offset],
            scores[best_offset + 1],
        );
        let denom = left - 2.0 * mid + right;
        let shift = if denom.abs() > f32::EPSILON {
            (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        let lag = (min_lag - 1 + best_offset) as f32 + shift;
        let hz = self.sample_rate as f32 / lag;
        if hz < self.f0_floor || hz > self.f0_ceil {
            return 0.0;
        }
        hz
    }
}

fn normalized_autocorrelation(frame: &[f32], lag: usize) -> f32 {
    let n = frame.len();
    if lag >= n {
        return 0.0;
    }
    let head = &frame[..n - lag];
    let tail = &frame[lag..];
    let cross = head.iter().zip(tail).map(|(a, b)| a * b).sum::<f32>();
    let e0 = head.iter().map(|x| x * x).sum::<f32>();
    let e1 = tail.iter().map(|x| x * x).sum::<f32>();
    let denom = (e0 * e1).sqrt();
    if denom <= f32::EPSILON {
        0.0
    } else {
        cross / denom
    }
}
