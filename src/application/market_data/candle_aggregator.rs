use crate::domain::errors::MarketDataError;
use crate::domain::market::{Candle, TradeEvent};
use std::collections::VecDeque;
use tracing::info;

/// Finalized bars kept in memory per symbol unless configured otherwise.
pub const DEFAULT_MAX_CLOSED_HISTORY: usize = 1000;

/// What one trade produced: the bar it finalized (if it rolled the bucket over)
/// and a snapshot of the open bar after applying it.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub closed: Option<Candle>,
    pub live: Candle,
}

/// Builds fixed-duration OHLCV bars for one symbol from trades applied in arrival order.
pub struct CandleAggregator {
    symbol: String,
    interval_ms: i64,
    current: Option<Candle>,
    closed: VecDeque<Candle>,
    max_closed_history: usize,
}

impl CandleAggregator {
    pub fn new(symbol: &str, interval_ms: i64) -> Self {
        Self::with_history_limit(symbol, interval_ms, DEFAULT_MAX_CLOSED_HISTORY)
    }

    pub fn with_history_limit(symbol: &str, interval_ms: i64, max_closed_history: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval_ms: interval_ms.max(1),
            current: None,
            closed: VecDeque::new(),
            max_closed_history,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Start of the bucket containing `timestamp_ms` (floor, also for negative times).
    ///
    /// `None` when the bucket start does not fit in an `i64`.
    pub fn bucket_start(&self, timestamp_ms: i64) -> Option<i64> {
        timestamp_ms
            .div_euclid(self.interval_ms)
            .checked_mul(self.interval_ms)
    }

    /// Apply one trade.
    ///
    /// A trade for a bucket earlier than the open one is rejected with
    /// [`MarketDataError::StaleTrade`] and leaves the aggregator untouched. So is a
    /// timestamp whose bucket cannot be represented, as [`MarketDataError::InvalidTrade`].
    pub fn process_trade(&mut self, trade: TradeEvent) -> Result<TradeOutcome, MarketDataError> {
        let bucket = self.bucket_start(trade.timestamp_ms).ok_or_else(|| {
            MarketDataError::InvalidTrade {
                reason: format!("timestamp {} out of range", trade.timestamp_ms),
            }
        })?;

        let (closed, live) = match self.current.take() {
            Some(mut candle) if candle.timestamp == bucket => {
                candle.apply(trade.price, trade.size);
                (None, candle)
            }
            Some(candle) if bucket < candle.timestamp => {
                let error = MarketDataError::StaleTrade {
                    timestamp_ms: trade.timestamp_ms,
                    bucket_ms: bucket,
                    open_bucket_ms: candle.timestamp,
                };
                self.current = Some(candle);
                return Err(error);
            }
            Some(candle) => {
                // New bucket! Finalize the old candle and start a new one
                let completed = self.finalize(candle);
                (
                    Some(completed),
                    Candle::open_at(&self.symbol, bucket, trade.price, trade.size),
                )
            }
            None => {
                info!(
                    "CandleAggregator: {} - First trade @ {}, starting aggregation",
                    self.symbol, trade.price
                );
                (
                    None,
                    Candle::open_at(&self.symbol, bucket, trade.price, trade.size),
                )
            }
        };

        self.current = Some(live.clone());
        Ok(TradeOutcome { closed, live })
    }

    fn finalize(&mut self, candle: Candle) -> Candle {
        info!(
            "CandleAggregator: {} candle completed → O:{} H:{} L:{} C:{} V:{}",
            self.symbol, candle.open, candle.high, candle.low, candle.close, candle.volume
        );

        self.closed.push_back(candle.clone());
        while self.closed.len() > self.max_closed_history {
            self.closed.pop_front();
        }
        candle
    }

    /// Snapshot of the open bar.
    pub fn current(&self) -> Option<Candle> {
        self.current.clone()
    }

    /// Finalized bars, oldest first.
    pub fn closed(&self) -> impl Iterator<Item = &Candle> {
        self.closed.iter()
    }

    pub fn closed_len(&self) -> usize {
        self.closed.len()
    }

    /// Finalize the open bar, e.g. at end of stream.
    pub fn flush(&mut self) -> Option<Candle> {
        let candle = self.current.take()?;
        Some(self.finalize(candle))
    }
}
