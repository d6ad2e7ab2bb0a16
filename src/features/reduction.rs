use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::PreprocessError;

/// Averages groups of `factor` consecutive frames, dropping the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePooler {
    factor: usize,
}

impl FramePooler {
    pub fn new(factor: usize) -> Result<Self, PreprocessError> {
        if factor == 0 {
            return Err(PreprocessError::invalid_input("reduction factor must be > 0"));
        }
        Ok(Self { factor })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn pooled_len(&self, frames: usize) -> usize {
        frames / self.factor
    }

    pub fn pool_1d(&self, values: ArrayView1<'_, f32>) -> Array1<f32> {
        if self.factor == 1 {
            return values.to_owned();
        }
        let out_len = self.pooled_len(values.len());
        Array1::from_iter((0..out_len).map(|i| {
            let start = i * self.factor;
            values.slice(s![start..start + self.factor]).sum() / self.factor as f32
        }))
    }

    /// Pools along the frame axis (axis 0).
    pub fn pool_2d(&self, values: ArrayView2<'_, f32>) -> Array2<f32> {
        if self.factor == 1 {
            return values.to_owned();
        }
        let out_len = self.pooled_len(values.nrows());
        let mut out = Array2::<f32>::zeros((out_len, values.ncols()));
        for (i, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
            let start = i * self.factor;
            let block = values.slice(s![start..start + self.factor, ..]);
            if let Some(mean) = block.mean_axis(Axis(0)) {
                row.assign(&mean);
            }
        }
        out
    }
}

/// Repeats row `i` of `x` `durations[i]` times, then zero-pads to `max_len`.
pub fn length_regulate(
    x: ArrayView2<'_, f32>,
    durations: &[usize],
    max_len: Option<usize>,
) -> Result<Array2<f32>, PreprocessError> {
    if durations.len() != x.nrows() {
        return Err(PreprocessError::invalid_input(format!(
            "duration count {} does not match frame count {}",
            durations.len(),
            x.nrows()
        )));
    }
    let expanded: usize = durations.iter().sum();
    let out_len = match max_len {
        Some(limit) if limit < expanded => {
            return Err(PreprocessError::invalid_input(format!(
                "expanded length {expanded} exceeds max_len {limit}"
            )))
        }
        Some(limit) => limit,
        None => expanded,
    };

    let mut out = Array2::<f32>::zeros((out_len, x.ncols()));
    let mut cursor = 0usize;
    for (row, &repeat) in x.axis_iter(Axis(0)).zip(durations) {
        for _ in 0..repeat {
            out.row_mut(cursor).assign(&row);
            cursor += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn pools_and_drops_remainder() {
        let pooler = FramePooler::new(2).unwrap();
        let out = pooler.pool_1d(array![1.0f32, 3.0, 5.0, 7.0, 9.0].view());
        assert_eq!(out, array![2.0f32, 6.0]);
    }

    #[test]
    fn factor_one_is_identity() {
        let pooler = FramePooler::new(1).unwrap();
        let x = array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]];
        assert_eq!(pooler.pool_2d(x.view()), x);
    }

    #[test]
    fn pools_rows_of_matrix() {
        let pooler = FramePooler::new(3).unwrap();
        let x = array![
            [0.0f32, 3.0],
            [1.0, 3.0],
            [2.0, 3.0],
            [9.0, 9.0]
        ];
        assert_eq!(pooler.pool_2d(x.view()), array![[1.0f32, 3.0]]);
    }

    #[test]
    fn zero_factor_is_rejected() {
        assert!(FramePooler::new(0).is_err());
    }

    #[test]
    fn length_regulate_expands_and_pads() {
        let x = array![[1.0f32], [2.0], [3.0]];
        let out = length_regulate(x.view(), &[2, 0, 1], Some(5)).unwrap();
        assert_eq!(out, array![[1.0f32], [1.0], [3.0], [0.0], [0.0]]);
    }

    #[test]
    fn length_regulate_checks_lengths() {
        let x = array![[1.0f32], [2.0]];
        assert!(length_regulate(x.view(), &[1], None).is_err());
        assert!(length_regulate(x.view(), &[2, 2], Some(3)).is_err());
    }
}
