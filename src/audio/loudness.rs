/// Full-scale reference for normalized float samples.
const FULL_SCALE: f64 = 1.0;

/// Loudness of a window in dBFS. Silent or empty windows are `-inf`.
pub fn dbfs(rms: f64) -> f64 {
    if rms <= 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * (rms / FULL_SCALE).log10()
}

/// Amplitude corresponding to a dBFS threshold.
pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0) * FULL_SCALE
}

pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq =
        samples.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / samples.len() as f64;
    mean_sq.sqrt()
}

/// Cumulative squared-sample sums so that any window RMS is O(1).
pub(crate) struct EnergyPrefix {
    cumulative: Vec<f64>,
}

impl EnergyPrefix {
    pub(crate) fn new(samples: &[f32]) -> Self {
        let mut cumulative = Vec::with_capacity(samples.len() + 1);
        let mut acc = 0.0f64;
        cumulative.push(acc);
        for &x in samples {
            acc += (x as f64) * (x as f64);
            cumulative.push(acc);
        }
        Self { cumulative }
    }

    pub(crate) fn len(&self) -> usize {
        self.cumulative.len() - 1
    }

    /// RMS over sample range `[start, end)`, clamped to the signal.
    pub(crate) fn rms(&self, start: usize, end: usize) -> f64 {
        let end = end.min(self.len());
        if start >= end {
            return 0.0;
        }
        let sum = (self.cumulative[end] - self.cumulative[start]).max(0.0);
        (sum / (end - start) as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbfs_of_full_scale_square_wave_is_zero() {
        let samples: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(dbfs(rms(&samples)).abs() < 1e-9);
    }

    #[test]
    fn silence_is_negative_infinity() {
        assert_eq!(dbfs(rms(&[0.0; 64])), f64::NEG_INFINITY);
        assert_eq!(dbfs(rms(&[])), f64::NEG_INFINITY);
    }

    #[test]
    fn db_round_trip() {
        let amp = db_to_amplitude(-20.0);
        assert!((amp - 0.1).abs() < 1e-12);
        assert!((dbfs(amp) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn prefix_rms_matches_direct_rms() {
        let samples: Vec<f32> = (0..257).map(|i| ((i as f32) * 0.37).sin() * 0.5).collect();
        let prefix = EnergyPrefix::new(&samples);
        for (start, end) in [(0, 257), (10, 20), (100, 101), (250, 400)] {
            let direct = rms(&samples[start..end.min(samples.len())]);
            assert!((prefix.rms(start, end) - direct).abs() < 1e-9);
        }
        assert_eq!(prefix.rms(300, 400), 0.0);
    }
}
