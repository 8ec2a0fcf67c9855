use crate::domain::eigenstate::{
    ClosedBar, EigenstateFit, EigenstateModel, EigenstateReading, PhaseQuadrant,
};
use crate::domain::indicators::{Ema, Indicator, IndicatorSettings, Macd, MacdValue, Rsi};
use crate::domain::market::Candle;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Confirmed indicator values after a candle close.
///
/// Every configured period has an entry; `None` means its window is not yet met.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmedSnapshot {
    pub symbol: String,
    /// Bucket start of the candle that produced these values.
    pub timestamp: i64,
    pub close: f64,
    pub ema: BTreeMap<usize, Option<f64>>,
    pub rsi: BTreeMap<usize, Option<f64>>,
    pub macd: Option<MacdValue>,
    pub eigenstate: Option<EigenstateReading>,
    pub volume_ratio: Option<f64>,
    /// Whether this close produced a new eigenstate fit.
    pub refitted: bool,
}

/// Projected indicator values for an in-progress candle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewSnapshot {
    pub symbol: String,
    pub timestamp: i64,
    pub price: f64,
    pub ema: BTreeMap<usize, Option<f64>>,
    pub rsi: BTreeMap<usize, Option<f64>>,
    pub macd: Option<MacdValue>,
    pub eigenstate: Option<EigenstateReading>,
    pub current_return: Option<f64>,
    pub phase: Option<f64>,
    pub quadrant: Option<PhaseQuadrant>,
}

/// All indicators tracked for one symbol, fed in lockstep from confirmed closes.
#[derive(Debug, Clone)]
pub struct IndicatorBank {
    symbol: String,
    emas: BTreeMap<usize, Ema>,
    rsis: BTreeMap<usize, Rsi>,
    macd: Option<Macd>,
    eigenstate: Option<EigenstateModel>,
    confirmed_bars: u64,
}

impl IndicatorBank {
    pub fn new(symbol: &str, settings: &IndicatorSettings) -> Self {
        let emas = settings
            .ema_periods
            .iter()
            .map(|&p| (p, Ema::new(p)))
            .collect();
        let rsis = settings
            .rsi_periods
            .iter()
            .map(|&p| (p, Rsi::new(p)))
            .collect();

        Self {
            symbol: symbol.to_string(),
            emas,
            rsis,
            macd: settings
                .macd
                .map(|m| Macd::new(m.fast_period, m.slow_period, m.signal_period)),
            eigenstate: settings.eigenstate.map(EigenstateModel::new),
            confirmed_bars: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn confirmed_bars(&self) -> u64 {
        self.confirmed_bars
    }

    pub fn ema(&self, period: usize) -> Option<&Ema> {
        self.emas.get(&period)
    }

    pub fn rsi(&self, period: usize) -> Option<&Rsi> {
        self.rsis.get(&period)
    }

    pub fn macd(&self) -> Option<&Macd> {
        self.macd.as_ref()
    }

    pub fn eigenstate(&self) -> Option<&EigenstateModel> {
        self.eigenstate.as_ref()
    }

    pub fn eigenstate_fit(&self) -> Option<Arc<EigenstateFit>> {
        self.eigenstate.as_ref()?.fit()
    }

    /// Fold one confirmed close into every indicator without building a snapshot.
    fn apply_close(&mut self, close: f64, volume: f64) -> bool {
        for ema in self.emas.values_mut() {
            ema.update(close);
        }
        for rsi in self.rsis.values_mut() {
            rsi.update(close);
        }
        if let Some(macd) = self.macd.as_mut() {
            macd.update(close);
        }
        self.confirmed_bars += 1;

        match self.eigenstate.as_mut() {
            Some(model) => model.update_bar(ClosedBar { close, volume }),
            None => false,
        }
    }

    /// Apply a finalized candle and report the confirmed values.
    pub fn on_candle_closed(&mut self, candle: &Candle) -> ConfirmedSnapshot {
        let refitted = self.apply_close(candle.close, candle.volume);
        debug!(
            "IndicatorBank: {} confirmed close {} (bar #{})",
            self.symbol, candle.close, self.confirmed_bars
        );
        self.confirmed(candle.timestamp, candle.close, refitted)
    }

    fn confirmed(&self, timestamp: i64, close: f64, refitted: bool) -> ConfirmedSnapshot {
        ConfirmedSnapshot {
            symbol: self.symbol.clone(),
            timestamp,
            close,
            ema: self.emas.iter().map(|(&p, e)| (p, e.value())).collect(),
            rsi: self.rsis.iter().map(|(&p, r)| (p, r.value())).collect(),
            macd: self.macd.as_ref().and_then(|m| m.value()),
            eigenstate: self.eigenstate.as_ref().and_then(|m| m.value()),
            volume_ratio: self.eigenstate.as_ref().and_then(|m| m.volume_ratio()),
            refitted,
        }
    }

    /// Project every indicator as if `price` closed the live candle. Never mutates.
    pub fn preview(&self, live: &Candle) -> PreviewSnapshot {
        let price = live.close;
        let current_return = self
            .eigenstate
            .as_ref()
            .and_then(|m| m.current_return(price));
        let fit = self.eigenstate_fit();
        let phase = match (&fit, current_return) {
            (Some(fit), Some(r)) => fit.phase_at(r),
            _ => None,
        };

        PreviewSnapshot {
            symbol: self.symbol.clone(),
            timestamp: live.timestamp,
            price,
            ema: self.emas.iter().map(|(&p, e)| (p, e.preview(price))).collect(),
            rsi: self.rsis.iter().map(|(&p, r)| (p, r.preview(price))).collect(),
            macd: self.macd.as_ref().and_then(|m| m.preview(price)),
            eigenstate: self.eigenstate.as_ref().and_then(|m| m.preview(price)),
            current_return,
            phase,
            quadrant: phase.map(PhaseQuadrant::from_angle),
        }
    }

    /// Seed from historical `(close, volume)` bars, oldest first.
    pub fn warmup(&mut self, bars: &[(f64, f64)]) -> usize {
        let mut applied = 0;
        for &(close, volume) in bars {
            if !close.is_finite() || close <= 0.0 {
                continue;
            }
            self.apply_close(close, volume.max(0.0));
            applied += 1;
        }
        info!(
            "IndicatorBank: {} warmed up with {}/{} bars",
            self.symbol,
            applied,
            bars.len()
        );
        applied
    }
}
