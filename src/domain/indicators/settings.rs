use crate::domain::eigenstate::EigenstateSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdSettings {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl Default for MacdSettings {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

/// The indicator set tracked for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSettings {
    pub ema_periods: Vec<usize>,
    pub rsi_periods: Vec<usize>,
    pub macd: Option<MacdSettings>,
    pub eigenstate: Option<EigenstateSettings>,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_periods: vec![9, 21],
            rsi_periods: vec![14],
            macd: Some(MacdSettings::default()),
            eigenstate: None,
        }
    }
}

impl IndicatorSettings {
    /// Bars needed before every configured indicator has a confirmed value.
    pub fn required_bars(&self) -> usize {
        let ema = self.ema_periods.iter().copied().max().unwrap_or(0);
        let rsi = self.rsi_periods.iter().map(|p| p + 1).max().unwrap_or(0);
        let macd = self
            .macd
            .map(|m| m.fast_period.max(m.slow_period) + m.signal_period - 1)
            .unwrap_or(0);
        let eigen = self
            .eigenstate
            .map(|e| e.lookback + e.return_spacing)
            .unwrap_or(0);
        [ema, rsi, macd, eigen].into_iter().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_bars_defaults() {
        // MACD: slow 26 + signal 9 − 1
        assert_eq!(IndicatorSettings::default().required_bars(), 34);
    }

    #[test]
    fn test_required_bars_with_eigenstate() {
        let settings = IndicatorSettings {
            eigenstate: Some(EigenstateSettings::default()),
            ..IndicatorSettings::default()
        };
        assert_eq!(settings.required_bars(), 101);
    }
}
