use crate::domain::errors::MarketDataError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-duration OHLCV bar.
///
/// `timestamp` is the bucket start in epoch milliseconds. Once a candle has been
/// finalized by the aggregator it is only ever handed out by value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: i64,
}

impl Candle {
    /// Open a new bar from its first trade.
    pub fn open_at(symbol: &str, bucket_ms: i64, price: f64, size: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: size,
            timestamp: bucket_ms,
        }
    }

    /// Fold one more trade into the bar.
    pub fn apply(&mut self, price: f64, size: f64) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += size;
    }

    /// Bucket start as a UTC datetime.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    /// `low <= min(open, close) <= max(open, close) <= high`
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }
}

/// Trade as yielded by a subscription, before validation.
///
/// Any field may be missing or garbage; see [`TradeEvent::try_from`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTrade {
    pub price: Option<f64>,
    pub size: Option<f64>,
    pub timestamp_ms: Option<i64>,
}

impl RawTrade {
    pub fn new(price: f64, size: f64, timestamp_ms: i64) -> Self {
        Self {
            price: Some(price),
            size: Some(size),
            timestamp_ms: Some(timestamp_ms),
        }
    }
}

/// A validated trade: `price > 0`, `size >= 0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TradeEvent {
    pub price: f64,
    pub size: f64,
    pub timestamp_ms: i64,
}

impl TryFrom<RawTrade> for TradeEvent {
    type Error = MarketDataError;

    fn try_from(raw: RawTrade) -> Result<Self, Self::Error> {
        let price = raw.price.ok_or_else(|| MarketDataError::InvalidTrade {
            reason: "missing price".to_string(),
        })?;
        let size = raw.size.ok_or_else(|| MarketDataError::InvalidTrade {
            reason: "missing size".to_string(),
        })?;
        let timestamp_ms = raw.timestamp_ms.ok_or_else(|| MarketDataError::InvalidTrade {
            reason: "missing timestamp".to_string(),
        })?;

        if !price.is_finite() || price <= 0.0 {
            return Err(MarketDataError::InvalidTrade {
                reason: format!("price must be a positive number, got {}", price),
            });
        }
        if !size.is_finite() || size < 0.0 {
            return Err(MarketDataError::InvalidTrade {
                reason: format!("size must be a non-negative number, got {}", size),
            });
        }

        Ok(Self {
            price,
            size,
            timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_ohlc_consistent() {
        let mut candle = Candle::open_at("BTC/USDT", 0, 100.0, 1.0);
        candle.apply(105.0, 0.5);
        candle.apply(95.0, 0.25);
        candle.apply(101.0, 0.25);

        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 105.0);
        assert_eq!(candle.low, 95.0);
        assert_eq!(candle.close, 101.0);
        assert!((candle.volume - 2.0).abs() < 1e-12);
        assert!(candle.is_consistent());
    }

    #[test]
    fn test_time_matches_bucket_start() {
        let candle = Candle::open_at("ETH/USDT", 1_704_067_200_000, 3500.0, 1.0);
        let time = candle.time().unwrap();
        assert_eq!(time.timestamp_millis(), 1_704_067_200_000);
    }

    #[test]
    fn test_valid_trade_converts() {
        let trade = TradeEvent::try_from(RawTrade::new(68000.0, 0.0, 42)).unwrap();
        assert_eq!(trade.price, 68000.0);
        assert_eq!(trade.size, 0.0);
        assert_eq!(trade.timestamp_ms, 42);
    }

    #[test]
    fn test_malformed_trades_rejected() {
        let cases = [
            RawTrade {
                price: None,
                ..RawTrade::new(1.0, 1.0, 0)
            },
            RawTrade::new(f64::NAN, 1.0, 0),
            RawTrade::new(-5.0, 1.0, 0),
            RawTrade::new(0.0, 1.0, 0),
            RawTrade::new(10.0, -1.0, 0),
            RawTrade::new(10.0, f64::INFINITY, 0),
            RawTrade {
                timestamp_ms: None,
                ..RawTrade::new(1.0, 1.0, 0)
            },
        ];

        for raw in cases {
            let result = TradeEvent::try_from(raw);
            assert!(
                matches!(result, Err(MarketDataError::InvalidTrade { .. })),
                "{:?} should be rejected",
                raw
            );
        }
    }
}
