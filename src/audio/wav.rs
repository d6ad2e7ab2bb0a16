use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::error::PreprocessError;
use crate::types::AudioSignal;

/// Decodes a WAV file into mono f32 samples, averaging interleaved channels.
pub fn read_wav_mono(path: &Path) -> Result<AudioSignal, PreprocessError> {
    let mut reader = WavReader::open(path).map_err(|e| PreprocessError::wav("open wav", e))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(PreprocessError::invalid_input(format!(
            "WAV has zero channels: {}",
            path.display()
        )));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| PreprocessError::wav("read float samples", e))?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample as i32;
            let scale = if bits > 1 {
                ((1_i64 << (bits - 1)) - 1) as f32
            } else {
                1.0
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| PreprocessError::wav("read int samples", e))?
        }
    };

    if channels == 1 {
        return Ok(AudioSignal::new(interleaved, spec.sample_rate));
    }

    let mono = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok(AudioSignal::new(mono, spec.sample_rate))
}
