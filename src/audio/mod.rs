//! Sample-domain processing: decoding, loudness, silence handling and resampling.

pub mod loudness;
pub mod resample;
pub mod silence;
pub mod trim;
pub mod wav;

pub use resample::resample;
pub use silence::{detect_leading_silence, detect_silence};
pub use trim::SilenceTrimmer;
pub use wav::read_wav_mono;
