use crate::features::VOICE_ACTIVITY_LOG_ENERGY;

/// F0 values at or below this are unvoiced.
pub const VOICED_EPS: f32 = 1e-6;

/// Fills unvoiced gaps of an F0 contour by linear interpolation.
///
/// Leading and trailing gaps take the first and last voiced value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchContinuityFilter {
    /// Frames whose log-energy falls below this are forced unvoiced first.
    pub log_energy_floor: f32,
}

impl Default for PitchContinuityFilter {
    fn default() -> Self {
        Self {
            log_energy_floor: VOICE_ACTIVITY_LOG_ENERGY,
        }
    }
}

impl PitchContinuityFilter {
    /// Returns `None` when fewer than two voiced frames remain.
    pub fn apply(&self, pitch: &[f32], log_energy: Option<&[f32]>) -> Option<Vec<f32>> {
        interpolate_unvoiced(&self.gate(pitch, log_energy))
    }

    /// Zeroes pitch on frames below the log-energy floor.
    pub fn gate(&self, pitch: &[f32], log_energy: Option<&[f32]>) -> Vec<f32> {
        let mut gated = pitch.to_vec();
        if let Some(energy) = log_energy {
            for (f0, &e) in gated.iter_mut().zip(energy) {
                if e < self.log_energy_floor {
                    *f0 = 0.0;
                }
            }
        }
        gated
    }
}

pub fn voiced_frame_count(pitch: &[f32]) -> usize {
    pitch.iter().filter(|&&v| v > VOICED_EPS).count()
}

/// Linear interpolation over unvoiced frames, clamped at the edges.
pub fn interpolate_unvoiced(pitch: &[f32]) -> Option<Vec<f32>> {
    let voiced: Vec<usize> = pitch
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > VOICED_EPS)
        .map(|(i, _)| i)
        .collect();
    if voiced.len() < 2 {
        return None;
    }

    let first = voiced[0];
    let last = voiced[voiced.len() - 1];
    let mut out = pitch.to_vec();
    out[..first].fill(pitch[first]);
    out[last + 1..].fill(pitch[last]);
    for pair in voiced.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let (va, vb) = (pitch[a], pitch[b]);
        let span = (b - a) as f32;
        for (k, slot) in out[a + 1..b].iter_mut().enumerate() {
            let w = (k + 1) as f32 / span;
            *slot = va + (vb - va) * w;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_interior_gap_linearly() {
        let out = interpolate_unvoiced(&[0.0, 100.0, 0.0, 0.0, 160.0, 0.0]).unwrap();
        assert_eq!(out, vec![100.0, 100.0, 120.0, 140.0, 160.0, 160.0]);
    }

    #[test]
    fn voiced_contour_is_unchanged() {
        let input = [110.0, 112.0, 115.0, 113.0];
        assert_eq!(interpolate_unvoiced(&input).unwrap(), input.to_vec());
    }

    #[test]
    fn fewer_than_two_voiced_frames_is_none() {
        assert!(interpolate_unvoiced(&[0.0, 0.0, 0.0]).is_none());
        assert!(interpolate_unvoiced(&[0.0, 120.0, 0.0]).is_none());
        assert!(interpolate_unvoiced(&[]).is_none());
    }

    #[test]
    fn energy_gate_unvoices_quiet_frames() {
        let pitch = [100.0, 110.0, 120.0, 130.0];
        let energy = [0.0, -9.0, 0.0, 0.0];
        let out = PitchContinuityFilter::default()
            .apply(&pitch, Some(&energy))
            .unwrap();
        assert_eq!(out[1], 110.0);
        let out = PitchContinuityFilter::default()
            .apply(&[100.0, 200.0, 50.0, 130.0], Some(&energy))
            .unwrap();
        assert_eq!(out[1], 75.0);
    }

    #[test]
    fn gate_can_leave_too_few_voiced_frames() {
        let pitch = [100.0, 110.0, 0.0];
        let energy = [-9.0, 0.0, 0.0];
        assert!(PitchContinuityFilter::default()
            .apply(&pitch, Some(&energy))
            .is_none());
    }

    #[test]
    fn counts_voiced_frames() {
        assert_eq!(voiced_frame_count(&[0.0, 1e-7, 90.0, 0.5]), 2);
    }
}
