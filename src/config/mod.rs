//! Configuration module for Eigentrade.
//!
//! Runtime settings come from environment variables; the indicator set comes from an
//! optional TOML file named by `INDICATOR_CONFIG`.

mod indicator_config;

pub use indicator_config::{IndicatorConfig, SymbolToggles};

use crate::domain::indicators::IndicatorSettings;
use anyhow::{Context, Result, bail};
use std::env;

/// Longest candle accepted from `CANDLE_SECONDS` (one week).
pub const MAX_CANDLE_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<String>,
    pub candle_seconds: u64,
    pub warmup_bars: usize,
    pub event_channel_capacity: usize,
    pub indicators: IndicatorConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let symbols: Vec<String> = get("SYMBOLS")
            .unwrap_or_else(|| "BTC/USDT".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            bail!("SYMBOLS must name at least one symbol");
        }

        let candle_seconds = parse_or(&get, "CANDLE_SECONDS", 10u64)?;
        if candle_seconds == 0 {
            bail!("CANDLE_SECONDS must be positive");
        }
        if candle_seconds > MAX_CANDLE_SECONDS {
            bail!(
                "CANDLE_SECONDS must be at most {} (got {})",
                MAX_CANDLE_SECONDS,
                candle_seconds
            );
        }

        let event_channel_capacity = parse_or(&get, "EVENT_CHANNEL_CAPACITY", 1024usize)?;
        if event_channel_capacity == 0 {
            bail!("EVENT_CHANNEL_CAPACITY must be positive");
        }

        let indicators = match get("INDICATOR_CONFIG").filter(|p| !p.trim().is_empty()) {
            Some(path) => IndicatorConfig::load(path.trim())
                .context("Failed to load indicator config")?,
            None => IndicatorConfig::default(),
        };

        Ok(Self {
            symbols,
            candle_seconds,
            warmup_bars: parse_or(&get, "WARMUP_BARS", 200usize)?,
            event_channel_capacity,
            indicators,
        })
    }

    /// Candle length in milliseconds, clamped to [`MAX_CANDLE_SECONDS`].
    pub fn candle_interval_ms(&self) -> i64 {
        self.candle_seconds.min(MAX_CANDLE_SECONDS) as i64 * 1000
    }

    pub fn indicator_settings(&self, symbol: &str) -> IndicatorSettings {
        self.indicators.settings_for(symbol)
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .context(format!("Failed to parse {}", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_source(source(&[])).expect("Should parse with defaults");
        assert_eq!(config.symbols, vec!["BTC/USDT".to_string()]);
        assert_eq!(config.candle_seconds, 10);
        assert_eq!(config.candle_interval_ms(), 10_000);
        assert_eq!(config.warmup_bars, 200);
        assert_eq!(config.event_channel_capacity, 1024);
        assert_eq!(config.indicators, IndicatorConfig::default());
    }

    #[test]
    fn test_symbols_list_parsing() {
        let config =
            Config::from_source(source(&[("SYMBOLS", " BTC/USDT, ETH/USDT ,,SOL/USDT")])).unwrap();
        assert_eq!(config.symbols, vec!["BTC/USDT", "ETH/USDT", "SOL/USDT"]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_source(source(&[("CANDLE_SECONDS", "0")])).is_err());
        assert!(Config::from_source(source(&[("CANDLE_SECONDS", "ten")])).is_err());
        assert!(Config::from_source(source(&[("CANDLE_SECONDS", "604801")])).is_err());
        assert!(
            Config::from_source(source(&[("CANDLE_SECONDS", "18446744073709551615")])).is_err()
        );
        assert!(Config::from_source(source(&[("WARMUP_BARS", "-1")])).is_err());
        assert!(Config::from_source(source(&[("EVENT_CHANNEL_CAPACITY", "0")])).is_err());
        assert!(Config::from_source(source(&[("SYMBOLS", " , ")])).is_err());
        assert!(
            Config::from_source(source(&[("INDICATOR_CONFIG", "/nonexistent/indicators.toml")]))
                .is_err()
        );
    }

    #[test]
    fn test_candle_interval_at_upper_bound() {
        let mut config = Config::from_source(source(&[("CANDLE_SECONDS", "604800")])).unwrap();
        assert_eq!(config.candle_interval_ms(), 604_800_000);

        // Values set past validation are clamped rather than wrapped
        config.candle_seconds = u64::MAX;
        assert_eq!(config.candle_interval_ms(), 604_800_000);
    }

    #[test]
    fn test_indicator_file_loaded_from_path() {
        let path = std::env::temp_dir().join(format!(
            "eigentrade-indicators-{}.toml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[[ema]]\nperiod = 5\n\n[[symbols]]\nsymbol = \"BTC/USDT\"\neigenstate = true").unwrap();

        let config =
            Config::from_source(source(&[("INDICATOR_CONFIG", path.to_str().unwrap())])).unwrap();
        std::fs::remove_file(&path).ok();

        let settings = config.indicator_settings("BTC/USDT");
        assert_eq!(settings.ema_periods, vec![5]);
        assert!(settings.eigenstate.is_some());
    }
}
