use crate::application::market_data::candle_aggregator::CandleAggregator;
use crate::application::market_data::indicator_bank::{
    ConfirmedSnapshot, IndicatorBank, PreviewSnapshot,
};
use crate::domain::eigenstate::EigenstateFit;
use crate::domain::errors::MarketDataError;
use crate::domain::market::{Candle, RawTrade, TradeEvent};
use crate::domain::ports::{MarketDataService, TradeSubscription};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub enum FeedEventKind {
    /// Live snapshot of the open candle, after every applied trade.
    CandleUpdate(Candle),
    /// A finalized candle.
    CandleClosed(Candle),
    Confirmed(ConfirmedSnapshot),
    Preview(PreviewSnapshot),
    /// A fresh eigenstate fit, published on each refit.
    Distribution(Arc<EigenstateFit>),
}

#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub symbol: String,
    pub kind: FeedEventKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub trades_applied: u64,
    pub trades_skipped: u64,
    pub candles_closed: u64,
    pub refits: u64,
}

/// Holds a subscription and closes it when dropped, whichever way the loop exits.
pub struct SubscriptionGuard {
    inner: Box<dyn TradeSubscription>,
}

impl SubscriptionGuard {
    pub fn new(inner: Box<dyn TradeSubscription>) -> Self {
        Self { inner }
    }

    pub async fn next_batch(&mut self) -> Result<Option<Vec<RawTrade>>, MarketDataError> {
        self.inner.next_batch().await
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.inner.close();
    }
}

/// Per-symbol aggregation loop: trades in, candles and indicator snapshots out.
pub struct LiveFeed {
    symbol: String,
    aggregator: CandleAggregator,
    bank: IndicatorBank,
    event_tx: broadcast::Sender<FeedEvent>,
    summary: FeedSummary,
}

impl LiveFeed {
    pub fn new(
        symbol: &str,
        interval_ms: i64,
        bank: IndicatorBank,
        event_tx: broadcast::Sender<FeedEvent>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            aggregator: CandleAggregator::new(symbol, interval_ms),
            bank,
            event_tx,
            summary: FeedSummary::default(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bank(&self) -> &IndicatorBank {
        &self.bank
    }

    pub fn aggregator(&self) -> &CandleAggregator {
        &self.aggregator
    }

    pub fn summary(&self) -> FeedSummary {
        self.summary
    }

    /// Subscribe and consume batches until the stream ends, shutdown is signalled,
    /// or the stream fails. The subscription is closed on every path.
    pub async fn run(
        &mut self,
        market_service: Arc<dyn MarketDataService>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<FeedSummary, MarketDataError> {
        let subscription = market_service
            .subscribe_trades(&self.symbol)
            .await
            .map_err(|e| MarketDataError::SubscriptionFailed {
                symbol: self.symbol.clone(),
                reason: e.to_string(),
            })?;
        let mut guard = SubscriptionGuard::new(subscription);

        info!("LiveFeed: {} subscribed to trades", self.symbol);

        loop {
            if *shutdown_rx.borrow() {
                info!("LiveFeed: {} received shutdown signal", self.symbol);
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        warn!("LiveFeed: {} shutdown sender dropped, stopping", self.symbol);
                        break;
                    }
                }
                batch = guard.next_batch() => {
                    match batch {
                        Ok(Some(trades)) => self.process_batch(trades),
                        Ok(None) => {
                            info!("LiveFeed: {} trade stream ended", self.symbol);
                            break;
                        }
                        Err(e) => {
                            error!("LiveFeed: {} stream failed: {}", self.symbol, e);
                            return Err(e);
                        }
                    }
                }
            }
        }

        info!(
            "LiveFeed: {} stopped ({} trades applied, {} skipped, {} candles closed)",
            self.symbol,
            self.summary.trades_applied,
            self.summary.trades_skipped,
            self.summary.candles_closed
        );
        Ok(self.summary)
    }

    /// Apply one batch strictly in arrival order.
    pub fn process_batch(&mut self, trades: Vec<RawTrade>) {
        for raw in trades {
            match self.process_raw(raw) {
                Ok(()) => self.summary.trades_applied += 1,
                Err(e) => {
                    warn!("LiveFeed: {} skipping trade: {}", self.symbol, e);
                    self.summary.trades_skipped += 1;
                }
            }
        }
    }

    fn process_raw(&mut self, raw: RawTrade) -> Result<(), MarketDataError> {
        let trade = TradeEvent::try_from(raw)?;
        let outcome = self.aggregator.process_trade(trade)?;

        if let Some(candle) = outcome.closed {
            self.summary.candles_closed += 1;
            let snapshot = self.bank.on_candle_closed(&candle);
            let refitted = snapshot.refitted;
            self.publish(FeedEventKind::CandleClosed(candle));
            self.publish(FeedEventKind::Confirmed(snapshot));

            if refitted && let Some(fit) = self.bank.eigenstate_fit() {
                self.summary.refits += 1;
                info!(
                    "LiveFeed: {} regime {} (n={}, σ={:.3e})",
                    self.symbol,
                    fit.regime(),
                    fit.n,
                    fit.sigma
                );
                self.publish(FeedEventKind::Distribution(fit));
            }
        }

        let preview = self.bank.preview(&outcome.live);
        self.publish(FeedEventKind::CandleUpdate(outcome.live));
        self.publish(FeedEventKind::Preview(preview));
        Ok(())
    }

    fn publish(&self, kind: FeedEventKind) {
        // No subscribers is not an error for the feed
        let _ = self.event_tx.send(FeedEvent {
            symbol: self.symbol.clone(),
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicators::IndicatorSettings;

    fn feed(interval_ms: i64) -> (LiveFeed, broadcast::Receiver<FeedEvent>) {
        let (tx, rx) = broadcast::channel(256);
        let settings = IndicatorSettings {
            ema_periods: vec![2],
            rsi_periods: vec![],
            macd: None,
            eigenstate: None,
        };
        let bank = IndicatorBank::new("BTC/USDT", &settings);
        (LiveFeed::new("BTC/USDT", interval_ms, bank, tx), rx)
    }

    fn drain(rx: &mut broadcast::Receiver<FeedEvent>) -> Vec<FeedEventKind> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event.kind);
        }
        out
    }

    #[test]
    fn test_malformed_trades_skipped_rest_of_batch_applied() {
        let (mut feed, _rx) = feed(1_000);
        feed.process_batch(vec![
            RawTrade::new(100.0, 1.0, 0),
            RawTrade {
                price: None,
                size: Some(1.0),
                timestamp_ms: Some(10),
            },
            RawTrade::new(-5.0, 1.0, 20),
            RawTrade::new(101.0, f64::NAN, 30),
            RawTrade::new(102.0, 2.0, 40),
        ]);

        let summary = feed.summary();
        assert_eq!(summary.trades_applied, 2);
        assert_eq!(summary.trades_skipped, 3);
        let live = feed.aggregator().current().unwrap();
        assert_eq!(live.close, 102.0);
        assert_eq!(live.volume, 3.0);
    }

    #[test]
    fn test_event_order_on_rollover() {
        let (mut feed, mut rx) = feed(1_000);
        feed.process_batch(vec![RawTrade::new(100.0, 1.0, 0)]);
        drain(&mut rx);

        feed.process_batch(vec![RawTrade::new(101.0, 1.0, 1_500)]);
        let kinds = drain(&mut rx);
        assert_eq!(kinds.len(), 4);
        assert!(matches!(kinds[0], FeedEventKind::CandleClosed(ref c) if c.close == 100.0));
        assert!(matches!(kinds[1], FeedEventKind::Confirmed(ref s) if s.close == 100.0));
        assert!(matches!(kinds[2], FeedEventKind::CandleUpdate(ref c) if c.timestamp == 1_000));
        assert!(matches!(kinds[3], FeedEventKind::Preview(ref p) if p.price == 101.0));
    }

    #[test]
    fn test_stale_trade_counts_as_skipped() {
        let (mut feed, _rx) = feed(1_000);
        feed.process_batch(vec![
            RawTrade::new(100.0, 1.0, 5_000),
            RawTrade::new(90.0, 1.0, 3_000),
        ]);
        assert_eq!(feed.summary().trades_skipped, 1);
        assert_eq!(feed.summary().candles_closed, 0);
    }

    #[test]
    fn test_out_of_range_timestamp_skipped_without_panic() {
        let (mut feed, _rx) = feed(1_000);
        feed.process_batch(vec![
            RawTrade::new(100.0, 1.0, i64::MIN),
            RawTrade::new(101.0, 1.0, 5),
        ]);

        let summary = feed.summary();
        assert_eq!(summary.trades_applied, 1);
        assert_eq!(summary.trades_skipped, 1);
        let live = feed.aggregator().current().unwrap();
        assert_eq!(live.open, 101.0);
        assert_eq!(live.timestamp, 0);
    }
}
