use super::Indicator;

/// Exponential Moving Average seeded with a simple mean.
///
/// Behaviour:
///   first `period` closes → value = mean of those closes
///   afterwards            → value = k·close + (1−k)·prev   where k = 2/(period+1)
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    value: Option<f64>,
    seed: Vec<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            value: None,
            seed: Vec::with_capacity(period),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn initialized(&self) -> bool {
        self.value.is_some()
    }
}

impl Indicator for Ema {
    type Input = f64;
    type Output = f64;

    fn update(&mut self, close: f64) {
        match self.value {
            Some(prev) => {
                self.value = Some(close * self.k + prev * (1.0 - self.k));
            }
            None => {
                self.seed.push(close);
                if self.seed.len() == self.period {
                    let mean = self.seed.iter().sum::<f64>() / self.period as f64;
                    self.value = Some(mean);
                    self.seed.clear();
                }
            }
        }
    }

    fn value(&self) -> Option<f64> {
        self.value
    }

    fn preview(&self, candidate: f64) -> Option<f64> {
        match self.value {
            Some(prev) => Some(candidate * self.k + prev * (1.0 - self.k)),
            // Candidate would complete the seed window
            None if self.seed.len() + 1 == self.period => {
                let sum = self.seed.iter().sum::<f64>() + candidate;
                Some(sum / self.period as f64)
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seed_then_recursive() {
        let mut ema = Ema::new(3);
        ema.update(1.0);
        ema.update(2.0);
        assert!(ema.value().is_none());

        ema.update(3.0);
        assert!((ema.value().unwrap() - 2.0).abs() < 1e-10);

        // k = 2/(3+1) = 0.5
        ema.update(4.0);
        assert!((ema.value().unwrap() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_preview_rehearses_seed() {
        let mut ema = Ema::new(3);
        assert!(ema.preview(10.0).is_none());

        ema.update(1.0);
        assert!(ema.preview(10.0).is_none());

        ema.update(2.0);
        // mean(1, 2, 6) = 3
        assert!((ema.preview(6.0).unwrap() - 3.0).abs() < 1e-10);
        assert!(!ema.initialized());
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let mut ema = Ema::new(3);
        for close in [1.0, 2.0, 3.0] {
            ema.update(close);
        }

        let a = ema.preview(10.0);
        let b = ema.preview(10.0);
        assert_eq!(a, b);
        assert!((a.unwrap() - 6.0).abs() < 1e-10);
        assert!((ema.value().unwrap() - 2.0).abs() < 1e-10);

        ema.update(4.0);
        assert!((ema.value().unwrap() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_period_one_tracks_close() {
        let mut ema = Ema::new(1);
        assert_eq!(ema.preview(7.0), Some(7.0));
        ema.update(5.0);
        assert_eq!(ema.value(), Some(5.0));
        ema.update(8.0);
        assert_eq!(ema.value(), Some(8.0));
    }

    #[test]
    fn test_warmup_five_closes_then_move() {
        let mut ema = Ema::new(5);
        for _ in 0..5 {
            ema.update(100.0);
        }
        assert!((ema.value().unwrap() - 100.0).abs() < 1e-10);

        ema.update(110.0);
        let expected = 110.0 * (2.0 / 6.0) + 100.0 * (4.0 / 6.0);
        assert!((ema.value().unwrap() - expected).abs() < 1e-10);
        assert!((ema.value().unwrap() - 103.333_333).abs() < 1e-4);
    }
}
