use crate::domain::errors::MarketDataError;
use crate::domain::market::RawTrade;
use anyhow::Result;
use async_trait::async_trait;

/// A live trade subscription for one symbol.
///
/// `next_batch` yields trades in arrival order; `Ok(None)` means the stream ended
/// normally. `close` releases the underlying resource and must be idempotent.
#[async_trait]
pub trait TradeSubscription: Send {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawTrade>>, MarketDataError>;
    fn close(&mut self);
}

// Need async_trait for async functions in traits
#[async_trait]
pub trait MarketDataService: Send + Sync {
    async fn subscribe_trades(&self, symbol: &str) -> Result<Box<dyn TradeSubscription>>;

    /// Most recent `limit` confirmed bars as `(close, volume)`, oldest first.
    async fn historical_bars(&self, symbol: &str, limit: usize) -> Result<Vec<(f64, f64)>>;
}
