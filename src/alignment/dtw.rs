use ndarray::ArrayView2;

use crate::error::PreprocessError;

#[inline(always)]
fn idx(row: usize, col: usize, cols: usize) -> usize {
    row * cols + col
}

/// Sum of absolute differences between two feature rows.
fn manhattan(a: ndarray::ArrayView1<'_, f32>, b: ndarray::ArrayView1<'_, f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Exact DTW between `target` (rows = frames) and `source` under L1 cost.
///
/// Returns the warping path as `(t, s)` pairs from `(0, 0)` to
/// `(Tt - 1, Ts - 1)`. On ties the backtrack prefers the diagonal step, then
/// the step that moves only `t`, then the step that moves only `s`.
/// `band` restricts cells to `|t - s·Tt/Ts| <= band`.
pub fn dtw_path(
    target: ArrayView2<'_, f32>,
    source: ArrayView2<'_, f32>,
    band: Option<usize>,
) -> Result<Vec<(usize, usize)>, PreprocessError> {
    let rows = target.nrows();
    let cols = source.nrows();
    if rows == 0 || cols == 0 {
        return Err(PreprocessError::invalid_input(format!(
            "DTW needs non-empty sequences, got {rows} target and {cols} source frames"
        )));
    }
    if target.ncols() != source.ncols() {
        return Err(PreprocessError::invalid_input(format!(
            "DTW feature widths differ: {} vs {}",
            target.ncols(),
            source.ncols()
        )));
    }

    let in_band = |r: usize, c: usize| -> bool {
        match band {
            None => true,
            Some(w) => {
                // diagonal position of column c scaled into row units
                let diag = (c * rows) as f64 / cols as f64;
                (r as f64 - diag).abs() <= w as f64 + (rows as f64 / cols as f64).max(1.0)
            }
        }
    };

    let mut cost = vec![f32::INFINITY; rows * cols];
    for r in 0..rows {
        let t_row = target.row(r);
        for c in 0..cols {
            if !in_band(r, c) {
                continue;
            }
            let d = manhattan(t_row, source.row(c));
            let best_prev = if r == 0 && c == 0 {
                0.0
            } else {
                let diag = if r > 0 && c > 0 {
                    cost[idx(r - 1, c - 1, cols)]
                } else {
                    f32::INFINITY
                };
                let up = if r > 0 {
                    cost[idx(r - 1, c, cols)]
                } else {
                    f32::INFINITY
                };
                let left = if c > 0 {
                    cost[idx(r, c - 1, cols)]
                } else {
                    f32::INFINITY
                };
                diag.min(up).min(left)
            };
            cost[idx(r, c, cols)] = d + best_prev;
        }
    }

    if !cost[idx(rows - 1, cols - 1, cols)].is_finite() {
        return Err(PreprocessError::alignment_invariant(
            "DTW band leaves no path between sequence ends",
        ));
    }

    let mut path = Vec::with_capacity(rows + cols);
    let (mut r, mut c) = (rows - 1, cols - 1);
    path.push((r, c));
    while r > 0 || c > 0 {
        if r > 0 && c > 0 {
            let diag = cost[idx(r - 1, c - 1, cols)];
            let up = cost[idx(r - 1, c, cols)];
            let left = cost[idx(r, c - 1, cols)];
            if diag <= up && diag <= left {
                r -= 1;
                c -= 1;
            } else if up <= left {
                r -= 1;
            } else {
                c -= 1;
            }
        } else if r > 0 {
            r -= 1;
        } else {
            c -= 1;
        }
        path.push((r, c));
    }
    path.reverse();

    tracing::debug!(
        target_frames = rows,
        source_frames = cols,
        path_len = path.len(),
        total_cost = cost[idx(rows - 1, cols - 1, cols)],
        "dtw: computed warping path"
    );
    Ok(path)
}
