use crate::error::PreprocessError;
use crate::types::{SentenceDurations, SilenceInterval};

/// Splits an utterance into sentences at target-side silences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceSegmenter {
    pub sample_rate: u32,
    pub hop_length: usize,
    pub reduction_factor: usize,
}

impl SentenceSegmenter {
    pub fn new(sample_rate: u32, hop_length: usize, reduction_factor: usize) -> Self {
        Self {
            sample_rate,
            hop_length,
            reduction_factor,
        }
    }

    /// Pooled target frame index of a millisecond offset, rounded down.
    pub fn ms_to_frame(&self, ms: u64) -> usize {
        let denom = self.hop_length as u64 * self.reduction_factor as u64 * 1000;
        if denom == 0 {
            return 0;
        }
        (ms * self.sample_rate as u64 / denom) as usize
    }

    /// Parallel source/target sentence lengths.
    ///
    /// Source boundaries are the first index whose cumulative duration exceeds
    /// the cumulative target length (index 0 when none does); the last source
    /// boundary is always `durations.len()`.
    pub fn segment(
        &self,
        durations: &[usize],
        target_len: usize,
        silences: &[SilenceInterval],
    ) -> Result<SentenceDurations, PreprocessError> {
        let target = self.raw_target_segments(silences, target_len);
        let source_len = durations.len();

        let mut cumulative = Vec::with_capacity(source_len);
        let mut running = 0usize;
        for &d in durations {
            running += d;
            cumulative.push(running);
        }

        let mut source = Vec::with_capacity(target.len());
        let mut target_sum = 0isize;
        let mut prev_boundary = 0isize;
        for (i, &len) in target.iter().enumerate() {
            target_sum += len;
            let boundary = if i + 1 == target.len() {
                source_len as isize
            } else {
                cumulative
                    .iter()
                    .position(|&c| c as isize > target_sum)
                    .unwrap_or(0) as isize
            };
            source.push(boundary - prev_boundary);
            prev_boundary = boundary;
        }

        if target.iter().chain(source.iter()).any(|&len| len <= 0) {
            return Err(PreprocessError::alignment_invariant(format!(
                "non-positive sentence length (source {source:?}, target {target:?})"
            )));
        }
        let source: Vec<usize> = source.into_iter().map(|len| len as usize).collect();
        let target: Vec<usize> = target.into_iter().map(|len| len as usize).collect();
        if source.iter().sum::<usize>() != source_len || target.iter().sum::<usize>() != target_len
        {
            return Err(PreprocessError::alignment_invariant(format!(
                "sentence lengths do not cover the utterance (source {source:?} vs {source_len}, target {target:?} vs {target_len})"
            )));
        }

        tracing::debug!(
            sentences = target.len(),
            source_frames = source_len,
            target_frames = target_len,
            "sentence: segmented utterance"
        );
        Ok(SentenceDurations { source, target })
    }

    /// Target sentence lengths in pooled frames; may be non-positive when
    /// silences crowd the end of the utterance.
    fn raw_target_segments(&self, silences: &[SilenceInterval], target_len: usize) -> Vec<isize> {
        let boundaries: Vec<isize> = silences
            .iter()
            .map(|interval| self.ms_to_frame(interval.start))
            .filter(|&frame| frame != 0)
            .map(|frame| frame as isize)
            .collect();
        let Some(&last) = boundaries.last() else {
            return vec![target_len as isize];
        };
        let mut segments = Vec::with_capacity(boundaries.len() + 1);
        let mut consumed = 0isize;
        for &frame in &boundaries {
            segments.push(frame - consumed);
            consumed = frame;
        }
        segments.push(target_len as isize - last);
        segments
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    // 1 pooled frame = 10 ms
    fn segmenter() -> SentenceSegmenter {
        SentenceSegmenter::new(16_000, 160, 1)
    }

    fn silence(start: u64, end: u64) -> SilenceInterval {
        SilenceInterval { start, end }
    }

    #[test]
    fn converts_ms_to_pooled_frames() {
        assert_eq!(segmenter().ms_to_frame(95), 9);
        assert_eq!(SentenceSegmenter::new(16_000, 160, 2).ms_to_frame(95), 4);
    }

    #[test]
    fn no_silence_yields_single_sentence() {
        let out = segmenter().segment(&[1, 1, 2, 0], 4, &[]).unwrap();
        assert_eq!(out.source, vec![4]);
        assert_eq!(out.target, vec![4]);
    }

    #[test]
    fn leading_silence_is_not_a_boundary() {
        let out = segmenter()
            .segment(&[1; 6], 6, &[silence(0, 20)])
            .unwrap();
        assert_eq!(out.target, vec![6]);
    }

    #[test]
    fn silence_inside_first_frame_is_not_a_boundary() {
        let out = segmenter()
            .segment(&[1; 10], 10, &[silence(5, 40), silence(60, 80)])
            .unwrap();
        assert_eq!(out.target, vec![6, 4]);
        assert_eq!(out.source, vec![6, 4]);
    }

    #[test]
    fn splits_at_interior_silences() {
        let durations = [1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
        let out = segmenter()
            .segment(&durations, 10, &[silence(30, 50), silence(70, 80)])
            .unwrap();
        assert_eq!(out.target, vec![3, 4, 3]);
        // cumulative 1..=10: first index with cum > 3 is 3, with cum > 7 is 7
        assert_eq!(out.source, vec![3, 4, 3]);
    }

    #[test]
    fn source_boundaries_follow_cumulative_durations() {
        let durations = [2, 2, 0, 2, 2];
        let out = segmenter()
            .segment(&durations, 8, &[silence(40, 60)])
            .unwrap();
        assert_eq!(out.target, vec![4, 4]);
        // cum = [2, 4, 4, 6, 8]; first cum > 4 at index 3
        assert_eq!(out.source, vec![3, 2]);
    }

    #[test]
    fn rejects_silence_at_the_very_end() {
        let err = segmenter()
            .segment(&[1; 5], 5, &[silence(50, 60)])
            .unwrap_err();
        assert!(matches!(err, PreprocessError::AlignmentInvariant { .. }));
    }

    fn silence_starts() -> impl Strategy<Value = Vec<SilenceInterval>> {
        prop::collection::btree_set(0u64..300, 0..6).prop_map(|starts| {
            starts
                .into_iter()
                .map(|start| silence(start, start + 10))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn segments_are_positive_and_cover_both_sides(
            durations in prop::collection::vec(0usize..4, 1..30),
            silences in silence_starts(),
        ) {
            let target_len: usize = durations.iter().sum();
            match segmenter().segment(&durations, target_len, &silences) {
                Ok(out) => {
                    prop_assert_eq!(out.source.len(), out.target.len());
                    prop_assert!(out.source.iter().chain(out.target.iter()).all(|&len| len > 0));
                    prop_assert_eq!(out.source.iter().sum::<usize>(), durations.len());
                    prop_assert_eq!(out.target.iter().sum::<usize>(), target_len);
                }
                Err(err) => {
                    prop_assert!(matches!(err, PreprocessError::AlignmentInvariant { .. }), "unexpected error: {:?}", err);
                }
            }
        }
    }
}
