use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PreprocessError;

/// Logarithm applied to the clipped mel magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogBase {
    #[default]
    #[serde(rename = "natural", alias = "e")]
    Natural,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "2")]
    Two,
}

impl LogBase {
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::Natural => x.ln(),
            Self::Ten => x.log10(),
            Self::Two => x.log2(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Ten => "10",
            Self::Two => "2",
        }
    }
}

impl fmt::Display for LogBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogBase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "natural" | "e" => Ok(Self::Natural),
            "10" => Ok(Self::Ten),
            "2" => Ok(Self::Two),
            other => Err(format!(
                "unsupported log base '{other}' (expected one of: natural, e, 10, 2)"
            )),
        }
    }
}

/// Every knob of the preprocessing recipe. Durations are in milliseconds,
/// thresholds in dBFS, lengths in samples unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub sample_rate: u32,
    pub silence_thresh_h: f32,
    pub silence_thresh_t: f32,
    /// Leading/trailing scan step, also the minimum length of zeroed interior silence.
    pub chunk_size: u32,
    /// Minimum silence length separating two sentences.
    pub min_silence_len: u32,
    pub filter_length: usize,
    pub hop_length: usize,
    pub win_length: usize,
    pub n_mel_channels: usize,
    pub mel_fmin: f32,
    pub mel_fmax: f32,
    pub clip: f32,
    pub log_base: LogBase,
    pub is_continuous_pitch: bool,
    pub reduction_factor: usize,
    pub sentence_duration: bool,
    pub n_jobs: usize,
    /// Mel channels of the coarse spectrogram used only for DTW.
    pub duration_mel_channels: usize,
    pub f0_floor: f32,
    pub f0_ceil: f32,
    /// Output trees are named `in_<tag>` and `out_<tag>`.
    pub output_tag: String,
    /// Sakoe-Chiba half-width in pooled frames. `None` runs unconstrained DTW.
    pub dtw_band: Option<usize>,
}

impl PreprocessConfig {
    pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 22_050;

    pub fn load(path: &Path) -> Result<Self, PreprocessError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| PreprocessError::io("read preprocess config", e))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| PreprocessError::json("parse preprocess config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PreprocessError> {
        let positive = [
            ("sample_rate", self.sample_rate as usize),
            ("chunk_size", self.chunk_size as usize),
            ("filter_length", self.filter_length),
            ("hop_length", self.hop_length),
            ("win_length", self.win_length),
            ("n_mel_channels", self.n_mel_channels),
            ("duration_mel_channels", self.duration_mel_channels),
            ("reduction_factor", self.reduction_factor),
            ("n_jobs", self.n_jobs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(PreprocessError::invalid_input(format!(
                "{name} must be > 0"
            )));
        }
        if self.win_length > self.filter_length {
            return Err(PreprocessError::invalid_input(format!(
                "win_length ({}) must not exceed filter_length ({})",
                self.win_length, self.filter_length
            )));
        }
        if !(self.mel_fmin >= 0.0 && self.mel_fmin < self.mel_fmax) {
            return Err(PreprocessError::invalid_input(format!(
                "mel range must satisfy 0 <= fmin < fmax, got [{}, {}]",
                self.mel_fmin, self.mel_fmax
            )));
        }
        if self.mel_fmax > self.sample_rate as f32 / 2.0 {
            return Err(PreprocessError::invalid_input(format!(
                "mel_fmax ({}) exceeds Nyquist ({})",
                self.mel_fmax,
                self.sample_rate as f32 / 2.0
            )));
        }
        if !(self.f0_floor > 0.0 && self.f0_floor < self.f0_ceil) {
            return Err(PreprocessError::invalid_input(format!(
                "f0 range must satisfy 0 < floor < ceil, got [{}, {}]",
                self.f0_floor, self.f0_ceil
            )));
        }
        if !(self.clip > 0.0) {
            return Err(PreprocessError::invalid_input("clip must be > 0"));
        }
        if self.output_tag.trim().is_empty() {
            return Err(PreprocessError::invalid_input("output_tag must not be empty"));
        }
        Ok(())
    }

    /// Analysis frame period shared by the mel and pitch extractors.
    pub fn frame_period_ms(&self) -> f64 {
        self.hop_length as f64 / self.sample_rate as f64 * 1000.0
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::DEFAULT_SAMPLE_RATE_HZ,
            silence_thresh_h: -50.0,
            silence_thresh_t: -50.0,
            chunk_size: 10,
            min_silence_len: 300,
            filter_length: 1024,
            hop_length: 256,
            win_length: 1024,
            n_mel_channels: 80,
            mel_fmin: 0.0,
            mel_fmax: 8_000.0,
            clip: 1e-3,
            log_base: LogBase::Natural,
            is_continuous_pitch: true,
            reduction_factor: 1,
            sentence_duration: false,
            n_jobs: 1,
            duration_mel_channels: 20,
            f0_floor: 71.0,
            f0_ceil: 800.0,
            output_tag: "fastspeech2VC".to_string(),
            dtw_band: None,
        }
    }
}
