use crate::audio::loudness::{db_to_amplitude, dbfs, EnergyPrefix};
use crate::types::{AudioSignal, SilenceInterval};

/// Milliseconds of leading audio quieter than `threshold_dbfs`.
///
/// Scans `chunk_ms` windows from the start until one reaches the threshold.
/// The result is a multiple of `chunk_ms` and may exceed the signal length
/// when the whole recording is silent.
pub fn detect_leading_silence(signal: &AudioSignal, threshold_dbfs: f64, chunk_ms: u64) -> u64 {
    if chunk_ms == 0 {
        return 0;
    }
    let prefix = EnergyPrefix::new(&signal.samples);
    let len_ms = signal.duration_ms();
    let mut trim_ms = 0u64;
    while trim_ms < len_ms {
        let start = signal.ms_to_sample(trim_ms);
        let end = signal.ms_to_sample(trim_ms + chunk_ms);
        if dbfs(prefix.rms(start, end)) >= threshold_dbfs {
            break;
        }
        trim_ms += chunk_ms;
    }
    trim_ms
}

/// Millisecond intervals where every `min_silence_ms` window is at or below
/// `threshold_dbfs`.
///
/// Window starts are probed every millisecond; overlapping or adjacent silent
/// windows merge into one interval ending `min_silence_ms` after the last
/// silent start.
pub fn detect_silence(
    signal: &AudioSignal,
    min_silence_ms: u64,
    threshold_dbfs: f64,
) -> Vec<SilenceInterval> {
    let len_ms = signal.duration_ms();
    if min_silence_ms == 0 || len_ms < min_silence_ms {
        return Vec::new();
    }
    let prefix = EnergyPrefix::new(&signal.samples);
    let threshold = db_to_amplitude(threshold_dbfs);

    let mut intervals = Vec::new();
    let mut range_start: Option<u64> = None;
    let mut prev_start = 0u64;
    for start_ms in 0..=(len_ms - min_silence_ms) {
        let start = signal.ms_to_sample(start_ms);
        let end = signal.ms_to_sample(start_ms + min_silence_ms);
        if prefix.rms(start, end) > threshold {
            continue;
        }
        match range_start {
            None => range_start = Some(start_ms),
            Some(open) => {
                let continuous = start_ms == prev_start + 1;
                let has_gap = start_ms > prev_start + min_silence_ms;
                if !continuous && has_gap {
                    intervals.push(SilenceInterval {
                        start: open,
                        end: prev_start + min_silence_ms,
                    });
                    range_start = Some(start_ms);
                }
            }
        }
        prev_start = start_ms;
    }
    if let Some(open) = range_start {
        intervals.push(SilenceInterval {
            start: open,
            end: prev_start + min_silence_ms,
        });
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 1_000;

    fn tone(ms: usize) -> Vec<f32> {
        (0..ms * SR as usize / 1000)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect()
    }

    fn signal(parts: &[(bool, usize)]) -> AudioSignal {
        let mut samples = Vec::new();
        for &(voiced, ms) in parts {
            if voiced {
                samples.extend(tone(ms));
            } else {
                samples.extend(std::iter::repeat(0.0f32).take(ms * SR as usize / 1000));
            }
        }
        AudioSignal::new(samples, SR)
    }

    #[test]
    fn leading_silence_is_chunk_aligned() {
        let sig = signal(&[(false, 35), (true, 100)]);
        // chunks [0,10) [10,20) [20,30) are silent, [30,40) contains voice
        assert_eq!(detect_leading_silence(&sig, -50.0, 10), 30);
    }

    #[test]
    fn leading_silence_of_voiced_signal_is_zero() {
        let sig = signal(&[(true, 100)]);
        assert_eq!(detect_leading_silence(&sig, -50.0, 10), 0);
    }

    #[test]
    fn leading_silence_of_silent_signal_covers_everything() {
        let sig = signal(&[(false, 95)]);
        assert!(detect_leading_silence(&sig, -50.0, 10) >= 95);
    }

    #[test]
    fn detects_interior_silence() {
        let sig = signal(&[(true, 100), (false, 50), (true, 100)]);
        let found = detect_silence(&sig, 20, -50.0);
        assert_eq!(found, vec![SilenceInterval { start: 100, end: 150 }]);
    }

    #[test]
    fn short_gaps_are_ignored() {
        let sig = signal(&[(true, 100), (false, 10), (true, 100)]);
        assert!(detect_silence(&sig, 20, -50.0).is_empty());
    }

    #[test]
    fn separate_silences_stay_separate() {
        let sig = signal(&[
            (false, 40),
            (true, 60),
            (false, 40),
            (true, 60),
        ]);
        let found = detect_silence(&sig, 20, -50.0);
        assert_eq!(
            found,
            vec![
                SilenceInterval { start: 0, end: 40 },
                SilenceInterval { start: 100, end: 140 },
            ]
        );
    }

    #[test]
    fn signal_shorter_than_window_has_no_silence() {
        let sig = signal(&[(false, 10)]);
        assert!(detect_silence(&sig, 20, -50.0).is_empty());
    }
}
