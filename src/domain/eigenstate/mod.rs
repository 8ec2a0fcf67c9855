//! Spectral regime model.
//!
//! Recent log-returns are scored against the densities `|ψ_n|²` of the first few
//! harmonic-oscillator eigenfunctions, each scaled so its variance matches the sample.
//! The most likely level `n` labels the regime, and the analytic signal of `ψ_n`
//! gives a phase angle for any return, used as a directional compass.
//!
//! The model only refits on confirmed closes. Each fit is an immutable
//! [`EigenstateFit`] behind an `Arc`, swapped wholesale on the next refit.

pub mod fit;
pub mod hermite;
pub mod phase;

pub use fit::{EigenstateFit, EigenstateReading, Regime};
pub use phase::{PhaseGrid, PhaseQuadrant};

use crate::domain::indicators::Indicator;
use hermite::guarded_ln;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Floor applied to arguments of `ln` and divisors.
pub const LN_FLOOR: f64 = 1e-300;
/// Return variance below this is a flat-price regime.
pub const VARIANCE_EPS: f64 = 1e-20;
/// Scale at or below this is treated as zero; also the scale stored for flat regimes.
pub const SIGMA_FLOOR: f64 = 1e-12;
/// `|H_n(ξ)|` below this marks a zero crossing.
pub const HERMITE_ZERO_EPS: f64 = 1e-12;
/// Minimum half-width of display ranges when all returns coincide.
pub const RANGE_EPS: f64 = 1e-10;
pub const PHASE_GRID_POINTS: usize = 2048;
pub const PHASE_XI_MAX: f64 = 6.0;
pub const DENSITY_CURVE_POINTS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EigenstateSettings {
    /// Number of returns per fit (L).
    pub lookback: usize,
    /// Highest energy level considered (N).
    pub max_level: usize,
    /// Bars between the two prices of a return (p).
    pub return_spacing: usize,
    /// Extra prices kept beyond `lookback + return_spacing`.
    pub buffer_margin: usize,
    /// Trailing bars averaged for the volume ratio.
    pub volume_window: usize,
}

impl Default for EigenstateSettings {
    fn default() -> Self {
        Self {
            lookback: 100,
            max_level: 4,
            return_spacing: 1,
            buffer_margin: 10,
            volume_window: 20,
        }
    }
}

/// A confirmed bar as seen by the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedBar {
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone)]
pub struct EigenstateModel {
    settings: EigenstateSettings,
    prices: VecDeque<f64>,
    volumes: VecDeque<f64>,
    fit: Option<Arc<EigenstateFit>>,
    volume_ratio: Option<f64>,
}

impl EigenstateModel {
    pub fn new(settings: EigenstateSettings) -> Self {
        let settings = EigenstateSettings {
            lookback: settings.lookback.max(2),
            return_spacing: settings.return_spacing.max(1),
            volume_window: settings.volume_window.max(1),
            ..settings
        };
        Self {
            settings,
            prices: VecDeque::with_capacity(settings.lookback + settings.return_spacing + 1),
            volumes: VecDeque::new(),
            fit: None,
            volume_ratio: None,
        }
    }

    pub fn settings(&self) -> &EigenstateSettings {
        &self.settings
    }

    /// Prices retained: `lookback + return_spacing + buffer_margin`.
    pub fn price_capacity(&self) -> usize {
        self.settings.lookback + self.settings.return_spacing + self.settings.buffer_margin
    }

    fn volume_capacity(&self) -> usize {
        self.price_capacity().max(self.settings.volume_window + 1)
    }

    pub fn buffered_prices(&self) -> usize {
        self.prices.len()
    }

    /// Apply a confirmed bar. Returns `true` when a new fit was produced.
    pub fn update_bar(&mut self, bar: ClosedBar) -> bool {
        self.prices.push_back(bar.close);
        self.volumes.push_back(bar.volume);

        let price_cap = self.price_capacity();
        while self.prices.len() > price_cap {
            self.prices.pop_front();
        }
        let volume_cap = self.volume_capacity();
        while self.volumes.len() > volume_cap {
            self.volumes.pop_front();
        }

        self.volume_ratio = self.trailing_volume_ratio();

        let returns = self.log_returns();
        if returns.len() < self.settings.lookback {
            return false;
        }

        let window = &returns[returns.len() - self.settings.lookback..];
        let fit = fit::fit_returns(window, self.settings.max_level);
        debug!(
            "EigenstateModel: fit n={} Ω={} σ={:.3e} quality={:.3}",
            fit.n, fit.omega, fit.sigma, fit.fit_quality
        );
        self.fit = Some(Arc::new(fit));
        true
    }

    /// `ln(price[i+p]) − ln(price[i])` over the buffer.
    pub fn log_returns(&self) -> Vec<f64> {
        let p = self.settings.return_spacing;
        if self.prices.len() <= p {
            return Vec::new();
        }
        (0..self.prices.len() - p)
            .map(|i| guarded_ln(self.prices[i + p]) - guarded_ln(self.prices[i]))
            .collect()
    }

    fn trailing_volume_ratio(&self) -> Option<f64> {
        let window = self.settings.volume_window;
        let len = self.volumes.len();
        if len < window + 1 {
            return None;
        }
        let latest = self.volumes[len - 1];
        let average = self.volumes.range(len - 1 - window..len - 1).sum::<f64>() / window as f64;
        (average > LN_FLOOR).then(|| latest / average)
    }

    /// Latest fit, shared.
    pub fn fit(&self) -> Option<Arc<EigenstateFit>> {
        self.fit.clone()
    }

    pub fn volume_ratio(&self) -> Option<f64> {
        self.volume_ratio
    }

    /// Phase angle of return `r` under the latest fit.
    pub fn compute_phase(&self, r: f64) -> Option<f64> {
        self.fit.as_ref()?.phase_at(r)
    }

    /// Return of an unconfirmed price against the close `return_spacing` bars back.
    pub fn current_return(&self, candidate: f64) -> Option<f64> {
        let p = self.settings.return_spacing;
        if self.prices.len() < p {
            return None;
        }
        let base = self.prices[self.prices.len() - p];
        Some(guarded_ln(candidate) - guarded_ln(base))
    }
}

impl Default for EigenstateModel {
    fn default() -> Self {
        Self::new(EigenstateSettings::default())
    }
}

impl Indicator for EigenstateModel {
    type Input = ClosedBar;
    type Output = EigenstateReading;

    fn update(&mut self, bar: ClosedBar) {
        self.update_bar(bar);
    }

    fn value(&self) -> Option<EigenstateReading> {
        self.fit.as_ref().map(|fit| fit.reading())
    }

    /// No speculative refit: the last confirmed reading stands until the next close.
    fn preview(&self, _candidate: f64) -> Option<EigenstateReading> {
        self.value()
    }
}
