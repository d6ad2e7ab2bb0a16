use rubato::{FftFixedIn, Resampler};

use crate::error::PreprocessError;
use crate::types::AudioSignal;

const CHUNK: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Converts `signal` to `target_rate_hz`, compensating the resampler delay so
/// the output length is `round(len * target / source)`.
pub fn resample(signal: &AudioSignal, target_rate_hz: u32) -> Result<AudioSignal, PreprocessError> {
    if signal.sample_rate_hz == 0 || target_rate_hz == 0 {
        return Err(PreprocessError::invalid_input("sample rate must be > 0"));
    }
    if signal.sample_rate_hz == target_rate_hz || signal.is_empty() {
        return Ok(AudioSignal::new(signal.samples.clone(), target_rate_hz));
    }

    let mut resampler = FftFixedIn::<f32>::new(
        signal.sample_rate_hz as usize,
        target_rate_hz as usize,
        CHUNK,
        SUB_CHUNKS,
        1,
    )
    .map_err(PreprocessError::resample)?;

    let expected_len = (signal.len() as f64 * target_rate_hz as f64
        / signal.sample_rate_hz as f64)
        .round() as usize;
    let delay = resampler.output_delay();
    let wanted = delay + expected_len;

    let mut out = Vec::with_capacity(wanted + CHUNK);
    let mut pos = 0usize;
    let mut block = vec![vec![0.0f32; CHUNK]];
    while out.len() < wanted {
        let end = (pos + CHUNK).min(signal.len());
        let input = &mut block[0];
        input.fill(0.0);
        if pos < end {
            input[..end - pos].copy_from_slice(&signal.samples[pos..end]);
        }
        let frames = resampler
            .process(&block, None)
            .map_err(PreprocessError::resample)?;
        if frames[0].is_empty() && pos >= signal.len() {
            break;
        }
        out.extend_from_slice(&frames[0]);
        pos = end.max(pos + CHUNK);
    }

    let start = delay.min(out.len());
    let stop = wanted.min(out.len());
    let mut samples = out[start..stop].to_vec();
    samples.resize(expected_len, 0.0);

    tracing::debug!(
        from_hz = signal.sample_rate_hz,
        to_hz = target_rate_hz,
        input_samples = signal.len(),
        output_samples = samples.len(),
        "resample: converted sample rate"
    );
    Ok(AudioSignal::new(samples, target_rate_hz))
}
