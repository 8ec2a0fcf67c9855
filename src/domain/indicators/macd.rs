use super::{Ema, Indicator};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD built from three owned EMAs: fast, slow, and a signal EMA over the MACD line.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    macd_line: Option<f64>,
    value: Option<MacdValue>,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast: Ema::new(fast_period),
            slow: Ema::new(slow_period),
            signal: Ema::new(signal_period),
            macd_line: None,
            value: None,
        }
    }

    /// Confirmed MACD line, available before the signal line is seeded.
    pub fn macd_line(&self) -> Option<f64> {
        self.macd_line
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Indicator for Macd {
    type Input = f64;
    type Output = MacdValue;

    fn update(&mut self, close: f64) {
        self.fast.update(close);
        self.slow.update(close);

        let (Some(fast), Some(slow)) = (self.fast.value(), self.slow.value()) else {
            return;
        };

        let macd = fast - slow;
        self.macd_line = Some(macd);
        self.signal.update(macd);

        if let Some(signal) = self.signal.value() {
            self.value = Some(MacdValue {
                macd,
                signal,
                histogram: macd - signal,
            });
        }
    }

    fn value(&self) -> Option<MacdValue> {
        self.value
    }

    /// The signal line is projected by feeding the previewed MACD value through the
    /// signal EMA's own preview, as if it were the next price. This is an approximation,
    /// not a forward simulation of the signal EMA.
    fn preview(&self, candidate: f64) -> Option<MacdValue> {
        let fast = self.fast.preview(candidate)?;
        let slow = self.slow.preview(candidate)?;
        let macd = fast - slow;
        let signal = self.signal.preview(macd)?;

        Some(MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closes() -> Vec<f64> {
        (0..40)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn test_preview_absent_before_seeding() {
        let mut macd = Macd::new(3, 5, 2);
        assert!(macd.preview(100.0).is_none());
        for close in [100.0, 101.0, 102.0] {
            macd.update(close);
        }
        // Fast seeded, slow needs two more closes
        assert!(macd.preview(103.0).is_none());
    }

    #[test]
    fn test_macd_line_before_signal() {
        let mut macd = Macd::new(2, 3, 3);
        for close in [10.0, 11.0, 12.0] {
            macd.update(close);
        }
        // fast: seed(10, 11) = 10.5, then 12·(2/3) + 10.5·(1/3) = 11.5; slow: mean = 11
        assert!((macd.macd_line().unwrap() - 0.5).abs() < 1e-10);
        assert!(macd.value().is_none());
    }

    #[test]
    fn test_confirmed_histogram_is_difference() {
        let mut macd = Macd::default();
        for close in closes() {
            macd.update(close);
        }
        let v = macd.value().unwrap();
        assert!((v.histogram - (v.macd - v.signal)).abs() < 1e-12);
    }

    #[test]
    fn test_preview_is_pure_and_repeatable() {
        let mut reference = Macd::new(3, 6, 3);
        let mut previewed = Macd::new(3, 6, 3);
        for close in closes() {
            reference.update(close);
            previewed.update(close);
        }

        let first = previewed.preview(104.2).unwrap();
        let second = previewed.preview(104.2).unwrap();
        assert_eq!(first, second);

        reference.update(99.5);
        previewed.update(99.5);
        assert_eq!(reference.value(), previewed.value());
    }

    #[test]
    fn test_preview_signal_uses_ema_preview_of_macd() {
        let mut macd = Macd::new(3, 6, 3);
        for close in closes() {
            macd.update(close);
        }

        let candidate = 101.0;
        let fast = macd.fast.preview(candidate).unwrap();
        let slow = macd.slow.preview(candidate).unwrap();
        let expected_signal = macd.signal.preview(fast - slow).unwrap();

        let preview = macd.preview(candidate).unwrap();
        assert!((preview.macd - (fast - slow)).abs() < 1e-12);
        assert!((preview.signal - expected_signal).abs() < 1e-12);
        assert!((preview.histogram - (preview.macd - preview.signal)).abs() < 1e-12);
    }
}
