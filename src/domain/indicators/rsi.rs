use super::Indicator;
use std::collections::VecDeque;

/// Relative Strength Index with Wilder smoothing.
///
/// Seeds once `period + 1` closes are available (simple averages of the first
/// `period` gains/losses), then applies
/// `avg = (avg·(period−1) + x) / period` per close.
///
/// Only the last `period + 1` closes are retained: that is the seeding window,
/// and the Wilder step only looks one close back.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    history: VecDeque<f64>,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
    value: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            history: VecDeque::with_capacity(period + 1),
            avg_gain: None,
            avg_loss: None,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn avg_gain(&self) -> Option<f64> {
        self.avg_gain
    }

    pub fn avg_loss(&self) -> Option<f64> {
        self.avg_loss
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn seed_averages<'a>(&self, closes: impl Iterator<Item = &'a f64>) -> (f64, f64) {
        let mut gains = 0.0;
        let mut losses = 0.0;
        let mut prev: Option<f64> = None;
        for &close in closes {
            if let Some(p) = prev {
                let delta = close - p;
                if delta > 0.0 {
                    gains += delta;
                } else {
                    losses += -delta;
                }
            }
            prev = Some(close);
        }
        (gains / self.period as f64, losses / self.period as f64)
    }

    fn wilder_step(&self, avg: f64, x: f64) -> f64 {
        (avg * (self.period as f64 - 1.0) + x) / self.period as f64
    }

    fn truncate(&mut self) {
        while self.history.len() > self.period + 1 {
            self.history.pop_front();
        }
    }
}

/// `100` when there are no losses, otherwise `100 − 100/(1+RS)`.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Indicator for Rsi {
    type Input = f64;
    type Output = f64;

    fn update(&mut self, close: f64) {
        let prev_close = self.history.back().copied();
        self.history.push_back(close);

        match (self.avg_gain, self.avg_loss, prev_close) {
            (Some(avg_gain), Some(avg_loss), Some(prev)) => {
                let delta = close - prev;
                let gain = delta.max(0.0);
                let loss = (-delta).max(0.0);
                let avg_gain = self.wilder_step(avg_gain, gain);
                let avg_loss = self.wilder_step(avg_loss, loss);
                self.avg_gain = Some(avg_gain);
                self.avg_loss = Some(avg_loss);
                self.value = Some(rsi_from_averages(avg_gain, avg_loss));
            }
            _ => {
                if self.history.len() >= self.period + 1 {
                    let skip = self.history.len() - (self.period + 1);
                    let (avg_gain, avg_loss) = self.seed_averages(self.history.iter().skip(skip));
                    self.avg_gain = Some(avg_gain);
                    self.avg_loss = Some(avg_loss);
                    self.value = Some(rsi_from_averages(avg_gain, avg_loss));
                }
            }
        }

        self.truncate();
    }

    fn value(&self) -> Option<f64> {
        self.value
    }

    fn preview(&self, candidate: f64) -> Option<f64> {
        let last = *self.history.back()?;

        match (self.avg_gain, self.avg_loss) {
            (Some(avg_gain), Some(avg_loss)) => {
                let delta = candidate - last;
                let est_gain = self.wilder_step(avg_gain, delta.max(0.0));
                let est_loss = self.wilder_step(avg_loss, (-delta).max(0.0));
                Some(rsi_from_averages(est_gain, est_loss))
            }
            _ if self.history.len() == self.period => {
                let (est_gain, est_loss) =
                    self.seed_averages(self.history.iter().chain(std::iter::once(&candidate)));
                Some(rsi_from_averages(est_gain, est_loss))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_seed_balanced_moves() {
        let mut rsi = Rsi::new(2);
        rsi.update(1.0);
        rsi.update(2.0);
        assert!(rsi.value().is_none());

        rsi.update(1.0);
        assert!((rsi.avg_gain().unwrap() - 0.5).abs() < 1e-12);
        assert!((rsi.avg_loss().unwrap() - 0.5).abs() < 1e-12);
        assert!((rsi.value().unwrap() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_strictly_increasing_pins_at_100() {
        let mut rsi = Rsi::new(14);
        for i in 0..60 {
            rsi.update(100.0 + i as f64);
            if let Some(v) = rsi.value() {
                assert_eq!(v, 100.0);
                assert_eq!(rsi.avg_loss(), Some(0.0));
            }
        }
        assert_eq!(rsi.value(), Some(100.0));
    }

    #[test]
    fn test_wilder_step_after_seed() {
        let mut rsi = Rsi::new(2);
        for close in [1.0, 2.0, 1.0] {
            rsi.update(close);
        }
        // delta +2: avg_gain = (0.5 + 2)/2 = 1.25, avg_loss = 0.5/2 = 0.25
        rsi.update(3.0);
        assert!((rsi.avg_gain().unwrap() - 1.25).abs() < 1e-12);
        assert!((rsi.avg_loss().unwrap() - 0.25).abs() < 1e-12);
        let expected = 100.0 - 100.0 / (1.0 + 5.0);
        assert!((rsi.value().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_preview_matches_next_update() {
        let closes = [44.0, 44.3, 44.1, 43.6, 44.3, 44.8, 45.1, 45.4];

        // Seeding boundary: history.len() == period
        let mut rsi = Rsi::new(4);
        for close in &closes[..4] {
            rsi.update(*close);
        }
        let previewed = rsi.preview(closes[4]).unwrap();
        rsi.update(closes[4]);
        assert!((previewed - rsi.value().unwrap()).abs() < 1e-12);

        // Steady state
        for close in &closes[5..] {
            let previewed = rsi.preview(*close).unwrap();
            rsi.update(*close);
            assert!((previewed - rsi.value().unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_preview_absent_before_window() {
        let mut rsi = Rsi::new(3);
        assert!(rsi.preview(1.0).is_none());
        rsi.update(1.0);
        rsi.update(2.0);
        assert!(rsi.preview(3.0).is_none());
    }

    #[test]
    fn test_preview_leaves_state_untouched() {
        let mut rsi = Rsi::new(2);
        for close in [1.0, 2.0, 1.0] {
            rsi.update(close);
        }
        let before = (rsi.avg_gain(), rsi.avg_loss(), rsi.value(), rsi.history_len());
        let _ = rsi.preview(50.0);
        let _ = rsi.preview(0.5);
        let after = (rsi.avg_gain(), rsi.avg_loss(), rsi.value(), rsi.history_len());
        assert_eq!(before, after);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut rsi = Rsi::new(5);
        for i in 0..1000 {
            rsi.update((i % 7) as f64 + 10.0);
            assert!(rsi.history_len() <= 6);
        }
    }
}
