use super::hermite::{self, log_density, log_density_checked};
use super::phase::{PhaseGrid, PhaseQuadrant};
use super::{DENSITY_CURVE_POINTS, RANGE_EPS, SIGMA_FLOOR, VARIANCE_EPS};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};
use std::fmt;

/// Headline numbers of a fit, cheap to copy around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EigenstateReading {
    pub n: usize,
    pub omega: usize,
    pub sigma: f64,
    pub fit_quality: f64,
}

/// Regime label by energy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    Calm,
    Active,
    Volatile,
    VeryVolatile,
    Extreme,
}

impl Regime {
    pub fn from_level(n: usize) -> Self {
        match n {
            0 => Regime::Calm,
            1 => Regime::Active,
            2 => Regime::Volatile,
            3 => Regime::VeryVolatile,
            _ => Regime::Extreme,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Calm => write!(f, "Calm (Gaussian)"),
            Regime::Active => write!(f, "Active (Bimodal)"),
            Regime::Volatile => write!(f, "Volatile"),
            Regime::VeryVolatile => write!(f, "Very Volatile"),
            Regime::Extreme => write!(f, "Extreme"),
        }
    }
}

/// Result of one maximum-likelihood fit plus everything needed to display it.
///
/// Built once per confirmed close and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct EigenstateFit {
    pub n: usize,
    pub omega: usize,
    pub sigma: f64,
    pub fit_quality: f64,
    pub return_grid: Vec<f64>,
    pub density_curve: Vec<f64>,
    pub histogram_counts: Vec<f64>,
    pub histogram_edges: Vec<f64>,
    #[serde(skip)]
    pub phase_grid: PhaseGrid,
}

impl EigenstateFit {
    pub fn reading(&self) -> EigenstateReading {
        EigenstateReading {
            n: self.n,
            omega: self.omega,
            sigma: self.sigma,
            fit_quality: self.fit_quality,
        }
    }

    pub fn regime(&self) -> Regime {
        Regime::from_level(self.n)
    }

    /// Phase angle of a return under this fit, `None` when σ is negligible.
    pub fn phase_at(&self, r: f64) -> Option<f64> {
        if self.sigma <= SIGMA_FLOOR {
            return None;
        }
        Some(self.phase_grid.phase_at_xi(hermite::xi(r, self.sigma)))
    }

    pub fn quadrant_at(&self, r: f64) -> Option<PhaseQuadrant> {
        self.phase_at(r).map(PhaseQuadrant::from_angle)
    }
}

/// Unbiased sample variance; `0` for fewer than two samples.
pub fn sample_variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    Data::new(xs.to_vec())
        .variance()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Mean log-density of `returns` under level `n` with scale `sigma`.
///
/// Samples on a zero crossing of `H_n` are left out. `None` when fewer than half
/// of the samples survive.
pub fn candidate_log_likelihood(returns: &[f64], n: usize, sigma: f64) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let valid: Vec<f64> = returns
        .iter()
        .filter_map(|&r| log_density_checked(n, r, sigma))
        .collect();

    if valid.len() * 2 < returns.len() {
        return None;
    }
    Some(valid.iter().sum::<f64>() / valid.len() as f64)
}

/// Select the energy level in `0..=max_level` that maximises the likelihood of `returns`.
pub fn fit_returns(returns: &[f64], max_level: usize) -> EigenstateFit {
    let var = sample_variance(returns);

    let (n, sigma, fit_quality) = if var < VARIANCE_EPS {
        (0, SIGMA_FLOOR, 0.0)
    } else {
        let mut best: Option<(usize, f64, f64)> = None;
        for n in 0..=max_level {
            let omega = 2 * n + 1;
            let sigma = (var / omega as f64).sqrt();
            if sigma <= SIGMA_FLOOR {
                continue;
            }
            let Some(ll) = candidate_log_likelihood(returns, n, sigma) else {
                continue;
            };
            // Strict comparison: the lowest level wins ties
            if best.is_none_or(|(_, _, best_ll)| ll > best_ll) {
                best = Some((n, sigma, ll));
            }
        }
        best.unwrap_or((0, var.sqrt(), 0.0))
    };

    let (histogram_counts, histogram_edges) = histogram(returns);
    let (return_grid, density_curve) = density_curve(returns, n, sigma);

    EigenstateFit {
        n,
        omega: 2 * n + 1,
        sigma,
        fit_quality,
        return_grid,
        density_curve,
        histogram_counts,
        histogram_edges,
        phase_grid: PhaseGrid::build(n),
    }
}

fn bounds(xs: &[f64]) -> (f64, f64) {
    xs.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        })
}

/// Bin count grows with √len, kept within 10..=50.
pub fn histogram_bins(len: usize) -> usize {
    ((len as f64).sqrt().round() as usize).clamp(10, 50)
}

/// Density-normalised histogram, so bar heights share the density curve's scale.
fn histogram(returns: &[f64]) -> (Vec<f64>, Vec<f64>) {
    if returns.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let bins = histogram_bins(returns.len());
    let (mut lo, mut hi) = bounds(returns);
    if hi - lo < RANGE_EPS {
        lo -= RANGE_EPS;
        hi += RANGE_EPS;
    }
    let width = (hi - lo) / bins as f64;

    let edges: Vec<f64> = (0..=bins).map(|i| lo + i as f64 * width).collect();
    let mut counts = vec![0.0; bins];
    for &r in returns {
        let idx = (((r - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1.0;
    }

    let scale = 1.0 / (returns.len() as f64 * width);
    for c in &mut counts {
        *c *= scale;
    }

    (counts, edges)
}

/// Fitted density sampled on a grid spanning the returns plus a 20% margin each side.
fn density_curve(returns: &[f64], n: usize, sigma: f64) -> (Vec<f64>, Vec<f64>) {
    if returns.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let (lo, hi) = bounds(returns);
    let margin = (0.2 * (hi - lo)).max(RANGE_EPS);
    let start = lo - margin;
    let step = (hi + margin - start) / (DENSITY_CURVE_POINTS - 1) as f64;

    let grid: Vec<f64> = (0..DENSITY_CURVE_POINTS)
        .map(|i| start + i as f64 * step)
        .collect();
    let curve = grid
        .iter()
        .map(|&r| log_density(n, r, sigma).exp())
        .collect();

    (grid, curve)
}
