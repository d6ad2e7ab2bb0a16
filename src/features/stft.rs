use std::f32::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::config::{LogBase, PreprocessConfig};
use crate::error::PreprocessError;
use crate::features::num_frames;

/// Parameters of one log-mel analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct MelParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub win_length: usize,
    pub n_mels: usize,
    pub fmin: f32,
    pub fmax: f32,
    pub clip: f32,
    pub log_base: LogBase,
}

impl MelParams {
    /// Full-resolution spectrogram persisted as the model feature.
    pub fn from_config(config: &PreprocessConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            n_fft: config.filter_length,
            hop_length: config.hop_length,
            win_length: config.win_length,
            n_mels: config.n_mel_channels,
            fmin: config.mel_fmin,
            fmax: config.mel_fmax,
            clip: config.clip,
            log_base: config.log_base,
        }
    }

    /// Coarse spectrogram used only as the DTW trajectory.
    pub fn for_duration(config: &PreprocessConfig) -> Self {
        Self {
            n_mels: config.duration_mel_channels,
            ..Self::from_config(config)
        }
    }
}

/// Log-mel spectrogram with the per-frame L2 norm of the magnitude spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogram {
    /// `(frames, n_mels)`.
    pub mel: Array2<f32>,
    /// Linear energy per frame.
    pub energy: Array1<f32>,
}

pub struct LogMelExtractor {
    params: MelParams,
    /// `(n_mels, n_fft / 2 + 1)`.
    filters: Array2<f32>,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl LogMelExtractor {
    pub fn new(params: MelParams) -> Result<Self, PreprocessError> {
        if params.n_fft == 0 || params.hop_length == 0 || params.n_mels == 0 {
            return Err(PreprocessError::invalid_input(
                "n_fft, hop_length and n_mels must be > 0",
            ));
        }
        if params.win_length == 0 || params.win_length > params.n_fft {
            return Err(PreprocessError::invalid_input(format!(
                "win_length must be in 1..={}, got {}",
                params.n_fft, params.win_length
            )));
        }
        let filters = mel_filterbank(
            params.sample_rate,
            params.n_fft,
            params.n_mels,
            params.fmin,
            params.fmax,
        );
        let window = padded_hann_window(params.win_length, params.n_fft);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(params.n_fft);
        Ok(Self {
            params,
            filters,
            window,
            fft,
        })
    }

    pub fn params(&self) -> &MelParams {
        &self.params
    }

    pub fn compute(&self, samples: &[f32]) -> MelSpectrogram {
        let n_fft = self.params.n_fft;
        let hop = self.params.hop_length;
        let frames = num_frames(samples.len(), hop);
        let bins = n_fft / 2 + 1;
        let n_mels = self.params.n_mels;

        let mut mel = Array2::<f32>::zeros((frames, n_mels));
        let mut energy = Array1::<f32>::zeros(frames);
        if samples.is_empty() {
            return MelSpectrogram { mel, energy };
        }

        let padded = reflect_pad_center(samples, n_fft / 2);
        let mut buffer = vec![Complex32::new(0.0, 0.0); n_fft];
        let mut magnitude = vec![0.0f32; bins];

        for t in 0..frames {
            let offset = t * hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let x = padded.get(offset + i).copied().unwrap_or(0.0);
                *slot = Complex32::new(x * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);

            let mut sum_sq = 0.0f32;
            for (bin, mag) in magnitude.iter_mut().enumerate() {
                *mag = buffer[bin].norm();
                sum_sq += *mag * *mag;
            }
            energy[t] = sum_sq.sqrt();

            for m in 0..n_mels {
                let value = self
                    .filters
                    .row(m)
                    .iter()
                    .zip(magnitude.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f32>();
                mel[(t, m)] = self.params.log_base.apply(value.max(self.params.clip));
            }
        }

        MelSpectrogram { mel, energy }
    }
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular filters with Slaney area normalization, shape `(n_mels, n_fft/2+1)`.
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Array2<f32> {
    let bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f32> = (0..bins)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let mel_f: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut filters = Array2::<f32>::zeros((n_mels, bins));
    for m in 0..n_mels {
        let lower_width = (mel_f[m + 1] - mel_f[m]).max(f32::EPSILON);
        let upper_width = (mel_f[m + 2] - mel_f[m + 1]).max(f32::EPSILON);
        let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]).max(f32::EPSILON);
        for (k, &f) in fft_freqs.iter().enumerate() {
            let lower = (f - mel_f[m]) / lower_width;
            let upper = (mel_f[m + 2] - f) / upper_width;
            filters[(m, k)] = lower.min(upper).max(0.0) * enorm;
        }
    }
    filters
}

/// Periodic Hann window of `win_length`, centered in `n_fft` zeros.
fn padded_hann_window(win_length: usize, n_fft: usize) -> Vec<f32> {
    let mut window = vec![0.0f32; n_fft];
    let offset = (n_fft - win_length) / 2;
    for i in 0..win_length {
        let phase = 2.0 * PI * i as f32 / win_length as f32;
        window[offset + i] = 0.5 - 0.5 * phase.cos();
    }
    window
}

fn reflect_pad_center(signal: &[f32], pad: usize) -> Vec<f32> {
    let n = signal.len();
    if n == 1 {
        return vec![signal[0]; n + 2 * pad];
    }
    (0..n + 2 * pad)
        .map(|i| signal[reflect_index(i as isize - pad as isize, n)])
        .collect()
}

fn reflect_index(index: isize, len: usize) -> usize {
    let period = (2 * (len - 1)) as isize;
    let mut x = index.rem_euclid(period);
    if x >= len as isize {
        x = period - x;
    }
    x as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MelParams {
        MelParams {
            sample_rate: 16_000,
            n_fft: 512,
            hop_length: 128,
            win_length: 512,
            n_mels: 40,
            fmin: 0.0,
            fmax: 8_000.0,
            clip: 1e-5,
            log_base: LogBase::Natural,
        }
    }

    fn sine(freq: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / 16_000.0).sin() * 0.5)
            .collect()
    }

    #[test]
    fn frame_count_matches_centered_stft() {
        let extractor = LogMelExtractor::new(params()).unwrap();
        let out = extractor.compute(&vec![0.0; 1_000]);
        assert_eq!(out.mel.dim(), (1_000 / 128 + 1, 40));
        assert_eq!(out.energy.len(), 1_000 / 128 + 1);
    }

    #[test]
    fn silence_is_clipped_to_log_floor() {
        let extractor = LogMelExtractor::new(params()).unwrap();
        let out = extractor.compute(&vec![0.0; 2_048]);
        let floor = 1e-5f32.ln();
        assert!(out.mel.iter().all(|&v| (v - floor).abs() < 1e-6));
        assert!(out.energy.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn tone_energy_peaks_in_matching_band() {
        let extractor = LogMelExtractor::new(params()).unwrap();
        let out = extractor.compute(&sine(1_000.0, 8_000));
        let frame = out.mel.row(out.mel.nrows() / 2);
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let centers: Vec<f32> = (0..42)
            .map(|i| mel_to_hz(hz_to_mel(8_000.0) * i as f32 / 41.0))
            .collect();
        assert!(
            (centers[peak + 1] - 1_000.0).abs() < 250.0,
            "peak band center {} Hz",
            centers[peak + 1]
        );
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0f32, 300.0, 999.0, 1_000.0, 4_000.0, 11_025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.05 * hz.max(1.0));
        }
    }

    #[test]
    fn filterbank_rows_are_non_negative_and_non_empty() {
        let filters = mel_filterbank(22_050, 1_024, 80, 0.0, 8_000.0);
        assert_eq!(filters.dim(), (80, 513));
        for row in filters.rows() {
            assert!(row.iter().all(|&w| w >= 0.0));
            assert!(row.iter().any(|&w| w > 0.0));
        }
    }

    #[test]
    fn rejects_window_longer_than_fft() {
        let bad = MelParams {
            win_length: 1_024,
            ..params()
        };
        assert!(LogMelExtractor::new(bad).is_err());
    }
}
