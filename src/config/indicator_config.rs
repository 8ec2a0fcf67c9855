//! Indicator configuration parsing from a TOML file.
//!
//! This module handles which indicators run, with which periods, for which symbols.

use crate::domain::eigenstate::EigenstateSettings;
use crate::domain::indicators::{IndicatorSettings, MacdSettings};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct PeriodEntry {
    period: usize,
}

fn enabled() -> bool {
    true
}

/// Per-symbol switches. Eigenstate is opt-in, everything else opt-out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SymbolToggles {
    pub symbol: String,
    #[serde(default = "enabled")]
    pub ema: bool,
    #[serde(default = "enabled")]
    pub rsi: bool,
    #[serde(default = "enabled")]
    pub macd: bool,
    #[serde(default)]
    pub eigenstate: bool,
}

impl SymbolToggles {
    fn defaults_for(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ema: true,
            rsi: true,
            macd: true,
            eigenstate: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndicatorFile {
    ema: Option<Vec<PeriodEntry>>,
    rsi: Option<Vec<PeriodEntry>>,
    macd: Option<MacdSettings>,
    eigenstate: Option<EigenstateSettings>,
    #[serde(default)]
    symbols: Vec<SymbolToggles>,
}

/// Resolved indicator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub ema_periods: Vec<usize>,
    pub rsi_periods: Vec<usize>,
    pub macd: MacdSettings,
    pub eigenstate: EigenstateSettings,
    pub symbols: HashMap<String, SymbolToggles>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        let defaults = IndicatorSettings::default();
        Self {
            ema_periods: defaults.ema_periods,
            rsi_periods: defaults.rsi_periods,
            macd: defaults.macd.unwrap_or_default(),
            eigenstate: EigenstateSettings::default(),
            symbols: HashMap::new(),
        }
    }
}

impl IndicatorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read indicator config {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid indicator config {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: IndicatorFile = toml::from_str(raw).context("Failed to parse indicator TOML")?;
        let defaults = Self::default();

        let config = Self {
            ema_periods: file
                .ema
                .map(|entries| entries.into_iter().map(|e| e.period).collect())
                .unwrap_or(defaults.ema_periods),
            rsi_periods: file
                .rsi
                .map(|entries| entries.into_iter().map(|e| e.period).collect())
                .unwrap_or(defaults.rsi_periods),
            macd: file.macd.unwrap_or(defaults.macd),
            eigenstate: file.eigenstate.unwrap_or(defaults.eigenstate),
            symbols: file
                .symbols
                .into_iter()
                .map(|t| (t.symbol.clone(), t))
                .collect(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(p) = self.ema_periods.iter().find(|&&p| p == 0) {
            bail!("EMA period must be positive, got {}", p);
        }
        if self.rsi_periods.contains(&0) {
            bail!("RSI period must be positive, got 0");
        }
        let macd = &self.macd;
        if macd.fast_period == 0 || macd.slow_period == 0 || macd.signal_period == 0 {
            bail!("MACD periods must be positive, got {:?}", macd);
        }
        if macd.fast_period >= macd.slow_period {
            bail!(
                "MACD fast period ({}) must be shorter than slow period ({})",
                macd.fast_period,
                macd.slow_period
            );
        }
        let eigen = &self.eigenstate;
        if eigen.lookback == 0 || eigen.return_spacing == 0 {
            bail!(
                "Eigenstate lookback and return_spacing must be positive, got {} and {}",
                eigen.lookback,
                eigen.return_spacing
            );
        }
        if eigen.volume_window == 0 {
            bail!("Eigenstate volume_window must be positive");
        }
        Ok(())
    }

    pub fn toggles_for(&self, symbol: &str) -> SymbolToggles {
        self.symbols
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| SymbolToggles::defaults_for(symbol))
    }

    /// The indicator set for `symbol` after applying its toggles.
    pub fn settings_for(&self, symbol: &str) -> IndicatorSettings {
        let toggles = self.toggles_for(symbol);
        IndicatorSettings {
            ema_periods: if toggles.ema {
                self.ema_periods.clone()
            } else {
                Vec::new()
            },
            rsi_periods: if toggles.rsi {
                self.rsi_periods.clone()
            } else {
                Vec::new()
            },
            macd: toggles.macd.then_some(self.macd),
            eigenstate: toggles.eigenstate.then_some(self.eigenstate),
        }
    }
}
