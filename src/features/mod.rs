//! Frame-level acoustic analysis and frame-rate conversion.

pub mod continuity;
pub mod pitch;
pub mod reduction;
pub mod stft;

pub use continuity::PitchContinuityFilter;
pub use pitch::AutocorrelationPitchTracker;
pub use reduction::{length_regulate, FramePooler};
pub use stft::{LogMelExtractor, MelParams, MelSpectrogram};

/// Natural-log floor applied to energy and pitch before they are stored.
pub const LOG_EPS: f32 = 1e-6;

/// Frames with `ln(energy + LOG_EPS)` below this are treated as silent.
pub const VOICE_ACTIVITY_LOG_ENERGY: f32 = -5.0;

/// Number of analysis frames for `num_samples` with centered framing.
pub fn num_frames(num_samples: usize, hop_length: usize) -> usize {
    if hop_length == 0 {
        return 0;
    }
    num_samples / hop_length + 1
}

/// `ln(x + LOG_EPS)` elementwise.
pub fn log_with_floor(values: &[f32]) -> Vec<f32> {
    values.iter().map(|&v| (v + LOG_EPS).ln()).collect()
}
