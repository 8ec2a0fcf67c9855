//! Eigentrade - headless live indicator feed
//!
//! Aggregates trades into candles per symbol, keeps EMA/RSI/MACD and the eigenstate
//! regime model up to date, and logs confirmed values and fits to stdout.
//!
//! # Usage
//! ```sh
//! SYMBOLS=BTC/USDT,ETH/USDT INDICATOR_CONFIG=indicators.toml cargo run
//! ```
//!
//! # Environment Variables
//! - `SYMBOLS` - Comma separated symbols (default: BTC/USDT)
//! - `CANDLE_SECONDS` - Candle duration (default: 10)
//! - `WARMUP_BARS` - Historical bars fetched before going live (default: 200)
//! - `INDICATOR_CONFIG` - Optional TOML indicator file
//! - `LOG_FORMAT` - `compact` for single-line logs (default: pretty)

use anyhow::{Context, Result};
use eigentrade::application::agents::live_feed::{FeedEvent, FeedEventKind, FeedSummary, LiveFeed};
use eigentrade::application::agents::warmup_service::WarmupService;
use eigentrade::application::market_data::indicator_bank::IndicatorBank;
use eigentrade::config::Config;
use eigentrade::domain::errors::MarketDataError;
use eigentrade::domain::ports::MarketDataService;
use eigentrade::infrastructure::mock::MockMarketDataService;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Eigentrade {} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded: Symbols={:?}, Candle={}s, Warmup={} bars",
        config.symbols, config.candle_seconds, config.warmup_bars
    );

    let market_service: Arc<dyn MarketDataService> = Arc::new(MockMarketDataService::new());
    let (event_tx, event_rx) = broadcast::channel(config.event_channel_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let logger = tokio::spawn(log_events(event_rx));

    let warmup = WarmupService::new(market_service.clone(), config.warmup_bars);
    let mut feeds = JoinSet::new();

    for symbol in &config.symbols {
        let settings = config.indicator_settings(symbol);
        let mut bank = IndicatorBank::new(symbol, &settings);
        warmup
            .warmup_bank(&mut bank, symbol, settings.required_bars())
            .await;

        let mut feed = LiveFeed::new(symbol, config.candle_interval_ms(), bank, event_tx.clone());
        let service = market_service.clone();
        let shutdown = shutdown_rx.clone();
        let symbol = symbol.clone();
        feeds.spawn(async move {
            let result = feed.run(service, shutdown).await;
            (symbol, result)
        });
    }
    // The logger ends once every feed has dropped its sender
    drop(event_tx);

    info!("Feeds running. Press Ctrl+C to shutdown.");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("Shutdown signal received. Stopping feeds...");
                let _ = shutdown_tx.send(true);
                break;
            }
            joined = feeds.join_next() => match joined {
                Some(result) => report_feed(result),
                None => {
                    info!("All feeds ended.");
                    break;
                }
            }
        }
    }

    while let Some(result) = feeds.join_next().await {
        report_feed(result);
    }
    if let Err(e) = logger.await {
        error!("EventLogger task failed: {}", e);
    }

    info!("Eigentrade stopped.");
    Ok(())
}

fn init_tracing() {
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into());
    let compact = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("compact"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if compact {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).compact())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).pretty())
            .init();
    }
}

fn report_feed(result: Result<(String, Result<FeedSummary, MarketDataError>), JoinError>) {
    match result {
        Ok((symbol, Ok(summary))) => info!(
            "Feed {} finished: {} trades applied, {} skipped, {} candles, {} refits",
            symbol,
            summary.trades_applied,
            summary.trades_skipped,
            summary.candles_closed,
            summary.refits
        ),
        Ok((symbol, Err(e))) => error!("Feed {} failed: {}", symbol, e),
        Err(e) => error!("Feed task aborted: {}", e),
    }
}

async fn log_events(mut rx: broadcast::Receiver<FeedEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => log_event(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("EventLogger: lagging, {} events dropped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn log_event(event: FeedEvent) {
    match event.kind {
        FeedEventKind::Confirmed(snapshot) => match serde_json::to_string(&snapshot) {
            Ok(json) => info!("Confirmed {}: {}", event.symbol, json),
            Err(e) => warn!("EventLogger: cannot encode snapshot: {}", e),
        },
        FeedEventKind::Distribution(fit) => {
            info!(
                "Distribution {}: {} (n={}, Ω={}, σ={:.3e}, quality={:.3})",
                event.symbol,
                fit.regime(),
                fit.n,
                fit.omega,
                fit.sigma,
                fit.fit_quality
            );
            match serde_json::to_string(&*fit) {
                Ok(json) => debug!("Distribution {} snapshot: {}", event.symbol, json),
                Err(e) => warn!("EventLogger: cannot encode fit: {}", e),
            }
        }
        FeedEventKind::Preview(preview) => debug!(
            "Preview {} @ {}: return={:?} phase={:?} quadrant={:?}",
            event.symbol, preview.price, preview.current_return, preview.phase, preview.quadrant
        ),
        FeedEventKind::CandleUpdate(_) | FeedEventKind::CandleClosed(_) => {}
    }
}
