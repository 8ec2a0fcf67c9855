use super::hermite::hermite;
use super::{LN_FLOOR, PHASE_GRID_POINTS, PHASE_XI_MAX};
use rustfft::{FftPlanner, num_complex::Complex};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Analytic signal `x + i·H[x]` via FFT.
///
/// Negative frequencies are zeroed and positive ones doubled; DC and (for even
/// lengths) Nyquist are kept once.
pub fn analytic_signal(signal: &[f64]) -> Vec<Complex<f64>> {
    let len = signal.len();
    if len == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(len).process(&mut buffer);

    let half = len / 2;
    let positive_end = len.div_ceil(2);
    for (i, c) in buffer.iter_mut().enumerate() {
        let weight = if i == 0 || (len % 2 == 0 && i == half) {
            1.0
        } else if i < positive_end {
            2.0
        } else {
            0.0
        };
        *c = c.scale(weight);
    }

    planner.plan_fft_inverse(len).process(&mut buffer);
    let norm = 1.0 / len as f64;
    buffer.iter().map(|c| c.scale(norm)).collect()
}

/// Instantaneous phase of `ψ_n` sampled on a fixed ξ grid.
///
/// Depends only on the energy level; the scale σ enters when a return is mapped to ξ.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseGrid {
    xi_min: f64,
    xi_max: f64,
    phases: Vec<f64>,
}

impl PhaseGrid {
    pub fn build(n: usize) -> Self {
        Self::with_domain(n, PHASE_XI_MAX, PHASE_GRID_POINTS)
    }

    pub fn with_domain(n: usize, xi_max: f64, points: usize) -> Self {
        let points = points.max(2);
        let xi_min = -xi_max;
        let step = (xi_max - xi_min) / (points - 1) as f64;

        let mut psi: Vec<f64> = (0..points)
            .map(|i| {
                let x = xi_min + i as f64 * step;
                hermite(n, x) * (-0.5 * x * x).exp()
            })
            .collect();

        let norm = (psi.iter().map(|v| v * v).sum::<f64>() * step).sqrt();
        if norm > LN_FLOOR {
            for v in &mut psi {
                *v /= norm;
            }
        }

        let phases = analytic_signal(&psi)
            .iter()
            .map(|c| c.im.atan2(c.re))
            .collect();

        Self {
            xi_min,
            xi_max,
            phases,
        }
    }

    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.xi_min, self.xi_max)
    }

    /// Linear interpolation of the phase at `xi`, clamped to the grid domain.
    pub fn phase_at_xi(&self, xi: f64) -> f64 {
        let last = self.phases.len() - 1;
        let x = if xi.is_nan() { 0.0 } else { xi.clamp(self.xi_min, self.xi_max) };
        let pos = (x - self.xi_min) / (self.xi_max - self.xi_min) * last as f64;
        let i0 = (pos.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let frac = pos - i0 as f64;
        self.phases[i0] + (self.phases[i1] - self.phases[i0]) * frac
    }
}

/// Directional reading of a phase angle on the compass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseQuadrant {
    Long,
    Short,
    MixedUp,
    MixedDown,
}

impl PhaseQuadrant {
    pub fn from_angle(theta: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        if cos >= 0.0 && sin <= 0.0 {
            PhaseQuadrant::Long
        } else if cos < 0.0 && sin > 0.0 {
            PhaseQuadrant::Short
        } else if cos >= 0.0 {
            PhaseQuadrant::MixedUp
        } else {
            PhaseQuadrant::MixedDown
        }
    }
}

/// Degrees in (−180, 180].
pub fn to_degrees(theta: f64) -> f64 {
    theta * 180.0 / PI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analytic_signal_of_cosine_is_exponential() {
        let len = 256;
        let freq = 8.0;
        let signal: Vec<f64> = (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / len as f64).cos())
            .collect();

        let analytic = analytic_signal(&signal);
        for (i, c) in analytic.iter().enumerate() {
            let angle = 2.0 * PI * freq * i as f64 / len as f64;
            assert!((c.re - angle.cos()).abs() < 1e-9);
            assert!((c.im - angle.sin()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_analytic_signal_preserves_real_part() {
        let signal: Vec<f64> = (0..100).map(|i| ((i * 7919) % 13) as f64 - 6.0).collect();
        let analytic = analytic_signal(&signal);
        for (x, c) in signal.iter().zip(&analytic) {
            assert!((x - c.re).abs() < 1e-9);
        }
        assert!(analytic_signal(&[]).is_empty());
    }

    #[test]
    fn test_phase_grid_is_bounded_and_finite() {
        for n in 0..5 {
            let grid = PhaseGrid::build(n);
            assert_eq!(grid.phases().len(), PHASE_GRID_POINTS);
            for &phase in grid.phases() {
                assert!(phase.is_finite());
                assert!((-PI..=PI).contains(&phase));
            }
        }
    }

    #[test]
    fn test_phase_lookup_clamps_outside_domain() {
        let grid = PhaseGrid::build(2);
        let first = grid.phases()[0];
        let last = *grid.phases().last().unwrap();
        assert_eq!(grid.phase_at_xi(-6.0), first);
        assert_eq!(grid.phase_at_xi(-40.0), first);
        assert_eq!(grid.phase_at_xi(6.0), last);
        assert_eq!(grid.phase_at_xi(1e9), last);
    }

    #[test]
    fn test_phase_lookup_interpolates_between_nodes() {
        let grid = PhaseGrid::with_domain(0, 1.0, 3);
        let p = grid.phases();
        let mid = grid.phase_at_xi(-0.5);
        assert!((mid - (p[0] + p[1]) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_quadrants() {
        assert_eq!(PhaseQuadrant::from_angle(-PI / 4.0), PhaseQuadrant::Long);
        assert_eq!(PhaseQuadrant::from_angle(3.0 * PI / 4.0), PhaseQuadrant::Short);
        assert_eq!(PhaseQuadrant::from_angle(PI / 4.0), PhaseQuadrant::MixedUp);
        assert_eq!(PhaseQuadrant::from_angle(-3.0 * PI / 4.0), PhaseQuadrant::MixedDown);
        assert_eq!(PhaseQuadrant::from_angle(0.0), PhaseQuadrant::Long);
    }
}
