use crate::domain::errors::MarketDataError;
use crate::domain::market::RawTrade;
use crate::domain::ports::{MarketDataService, TradeSubscription};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// One step of a scripted trade stream.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Batch(Vec<RawTrade>),
    /// The stream fails with `ConnectionLost`.
    Fail(String),
    /// The stream stays open without yielding until closed or cancelled.
    Hang,
}

#[derive(Debug, Default)]
struct SubscriptionCounters {
    opened: AtomicUsize,
    released: AtomicUsize,
}

/// In-process market data: a random-walk simulator for demo runs, or scripted
/// streams and history for tests.
#[derive(Clone)]
pub struct MockMarketDataService {
    pub simulation_enabled: bool,
    tick: Duration,
    seed: u64,
    scripts: HashMap<String, Vec<ScriptStep>>,
    history: HashMap<String, Vec<(f64, f64)>>,
    history_failure: Option<String>,
    subscribe_failure: Option<String>,
    counters: Arc<SubscriptionCounters>,
}

impl MockMarketDataService {
    pub fn new() -> Self {
        Self {
            simulation_enabled: true,
            tick: Duration::from_millis(500),
            seed: 7,
            scripts: HashMap::new(),
            history: HashMap::new(),
            history_failure: None,
            subscribe_failure: None,
            counters: Arc::new(SubscriptionCounters::default()),
        }
    }

    /// No simulation: subscriptions replay their script, history is whatever was given.
    pub fn scripted() -> Self {
        Self {
            simulation_enabled: false,
            ..Self::new()
        }
    }

    pub fn with_script(mut self, symbol: &str, steps: Vec<ScriptStep>) -> Self {
        self.scripts.insert(symbol.to_string(), steps);
        self
    }

    pub fn with_history(mut self, symbol: &str, bars: Vec<(f64, f64)>) -> Self {
        self.history.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_history_failure(mut self, reason: &str) -> Self {
        self.history_failure = Some(reason.to_string());
        self
    }

    pub fn with_subscribe_failure(mut self, reason: &str) -> Self {
        self.subscribe_failure = Some(reason.to_string());
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Subscriptions handed out so far.
    pub fn subscriptions(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Subscriptions released so far (each counted once however often `close` is called).
    pub fn releases(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    fn seed_for(&self, symbol: &str) -> u64 {
        symbol
            .bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
    }

    fn simulated_history(&self, symbol: &str, limit: usize) -> Vec<(f64, f64)> {
        let mut rng = StdRng::seed_from_u64(self.seed_for(symbol) ^ 0x5eed);
        let mut price = base_price(symbol);
        (0..limit)
            .map(|_| {
                price *= 1.0 + rng.random_range(-0.002..0.002);
                (price, rng.random_range(0.5..50.0))
            })
            .collect()
    }
}

impl Default for MockMarketDataService {
    fn default() -> Self {
        Self::new()
    }
}

fn base_price(symbol: &str) -> f64 {
    if symbol.contains("BTC") {
        96000.0
    } else if symbol.contains("ETH") {
        3400.0
    } else if symbol.contains("AVAX") {
        40.0
    } else {
        150.0
    }
}

#[async_trait]
impl MarketDataService for MockMarketDataService {
    async fn subscribe_trades(&self, symbol: &str) -> Result<Box<dyn TradeSubscription>> {
        if let Some(reason) = &self.subscribe_failure {
            return Err(anyhow!("mock subscribe failure for {}: {}", symbol, reason));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);

        match self.scripts.get(symbol) {
            Some(steps) => {
                info!(
                    "MockMarketDataService: Subscribed to {} ({} scripted steps)",
                    symbol,
                    steps.len()
                );
                Ok(Box::new(ScriptedSubscription {
                    steps: steps.iter().cloned().collect(),
                    closed: false,
                    counters: self.counters.clone(),
                }))
            }
            None if self.simulation_enabled => {
                info!(
                    "MockMarketDataService: Subscribed to {} (Simulation Enabled)",
                    symbol
                );
                Ok(Box::new(SimulatedSubscription {
                    rng: StdRng::seed_from_u64(self.seed_for(symbol)),
                    price: base_price(symbol),
                    tick: self.tick,
                    closed: false,
                    counters: self.counters.clone(),
                }))
            }
            None => {
                info!(
                    "MockMarketDataService: Subscribed to {} (no script, stream ends immediately)",
                    symbol
                );
                Ok(Box::new(ScriptedSubscription {
                    steps: VecDeque::new(),
                    closed: false,
                    counters: self.counters.clone(),
                }))
            }
        }
    }

    async fn historical_bars(&self, symbol: &str, limit: usize) -> Result<Vec<(f64, f64)>> {
        if let Some(reason) = &self.history_failure {
            return Err(anyhow!("mock history failure for {}: {}", symbol, reason));
        }
        if let Some(bars) = self.history.get(symbol) {
            let start = bars.len().saturating_sub(limit);
            return Ok(bars[start..].to_vec());
        }
        if self.simulation_enabled {
            return Ok(self.simulated_history(symbol, limit));
        }
        Ok(vec![])
    }
}

struct ScriptedSubscription {
    steps: VecDeque<ScriptStep>,
    closed: bool,
    counters: Arc<SubscriptionCounters>,
}

#[async_trait]
impl TradeSubscription for ScriptedSubscription {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawTrade>>, MarketDataError> {
        if self.closed {
            return Ok(None);
        }
        match self.steps.pop_front() {
            Some(ScriptStep::Batch(trades)) => Ok(Some(trades)),
            Some(ScriptStep::Fail(reason)) => Err(MarketDataError::ConnectionLost { reason }),
            Some(ScriptStep::Hang) => {
                self.steps.push_front(ScriptStep::Hang);
                std::future::pending().await
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct SimulatedSubscription {
    rng: StdRng,
    price: f64,
    tick: Duration,
    closed: bool,
    counters: Arc<SubscriptionCounters>,
}

#[async_trait]
impl TradeSubscription for SimulatedSubscription {
    async fn next_batch(&mut self) -> Result<Option<Vec<RawTrade>>, MarketDataError> {
        if self.closed {
            return Ok(None);
        }
        tokio::time::sleep(self.tick).await;

        let count = self.rng.random_range(1..=5);
        let now = Utc::now().timestamp_millis();
        let batch = (0..count)
            .map(|i| {
                // -0.05% to +0.05% per trade
                self.price *= 1.0 + self.rng.random_range(-0.0005..0.0005);
                let size = self.rng.random_range(0.001..2.0);
                RawTrade::new(self.price, size, now + i as i64)
            })
            .collect::<Vec<_>>();
        debug!("MockMarketDataService: Simulated {} trades", batch.len());
        Ok(Some(batch))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}
