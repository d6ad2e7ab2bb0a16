use ndarray::ArrayView2;

use crate::alignment::dtw::dtw_path;
use crate::error::PreprocessError;

/// Per-source-frame durations from a DTW path over `source_len` frames.
///
/// Every source frame starts at one. A step that keeps `t` fixed zeroes the
/// new source frame; a step that keeps `s` fixed adds one to that source frame
/// once the run ends.
pub fn path_to_durations(path: &[(usize, usize)], source_len: usize) -> Vec<usize> {
    let mut durations = vec![1usize; source_len];
    let Some(&(mut prev_t, mut prev_s)) = path.first() else {
        return durations;
    };
    let mut run = 0usize;
    for &(t, s) in &path[1..] {
        if t == prev_t {
            durations[s] = 0;
        }
        if s == prev_s {
            run += 1;
        } else if run > 0 {
            durations[prev_s] += run;
            run = 0;
        }
        prev_t = t;
        prev_s = s;
    }
    if run > 0 {
        durations[prev_s] += run;
    }
    durations
}

/// Half-open `[start, end)` spans where `mask` is true.
pub fn silent_runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut open: Option<usize> = None;
    for (i, &silent) in mask.iter().enumerate() {
        match (silent, open) {
            (true, None) => open = Some(i),
            (false, Some(start)) => {
                runs.push((start, i));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        runs.push((start, mask.len()));
    }
    runs
}

/// Spreads each silent span's total duration evenly over its frames.
///
/// Spans with fewer target frames than source frames get ones packed at the
/// front and zeros after. Returns the number of spans corrected.
pub fn correct_silent_spans(durations: &mut [usize], mask: &[bool]) -> usize {
    let runs = silent_runs(mask);
    for &(start, end) in &runs {
        let span = &mut durations[start..end];
        let n = span.len();
        let total: usize = span.iter().sum();
        if total > n {
            let mean = total / n;
            let rest = total % n;
            for (i, d) in span.iter_mut().enumerate() {
                *d = mean + usize::from(i < rest);
            }
        } else {
            for (i, d) in span.iter_mut().enumerate() {
                *d = usize::from(i < total);
            }
        }
    }
    runs.len()
}

/// DTW-based duration extraction for one source/target pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationAligner {
    pub band: Option<usize>,
}

impl DurationAligner {
    pub fn new(band: Option<usize>) -> Self {
        Self { band }
    }

    /// Durations over `source` rows that sum to the number of `target` rows.
    pub fn align(
        &self,
        target: ArrayView2<'_, f32>,
        source: ArrayView2<'_, f32>,
        silence_mask: Option<&[bool]>,
    ) -> Result<Vec<usize>, PreprocessError> {
        let target_len = target.nrows();
        let source_len = source.nrows();
        if let Some(mask) = silence_mask {
            if mask.len() != source_len {
                return Err(PreprocessError::invalid_input(format!(
                    "silence mask has {} entries for {source_len} source frames",
                    mask.len()
                )));
            }
        }

        let path = dtw_path(target, source, self.band)?;
        let mut durations = path_to_durations(&path, source_len);
        let silent_spans = match silence_mask {
            Some(mask) => correct_silent_spans(&mut durations, mask),
            None => 0,
        };

        let total: usize = durations.iter().sum();
        if total != target_len {
            return Err(PreprocessError::alignment_invariant(format!(
                "duration sum {total} does not match target length {target_len}"
            )));
        }

        tracing::debug!(
            source_frames = source_len,
            target_frames = target_len,
            silent_spans,
            zero_frames = durations.iter().filter(|&&d| d == 0).count(),
            max_duration = durations.iter().copied().max().unwrap_or(0),
            "duration: aligned source to target"
        );
        Ok(durations)
    }
}
