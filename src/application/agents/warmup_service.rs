use crate::application::market_data::indicator_bank::IndicatorBank;
use crate::domain::ports::MarketDataService;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Service responsible for warming up indicator banks with historical data.
///
/// Historical bars go through the same confirmed path as live closes, so a warmed
/// bank is indistinguishable from one that watched those candles close.
pub struct WarmupService {
    market_service: Arc<dyn MarketDataService>,
    warmup_bars: usize,
}

impl WarmupService {
    pub fn new(market_service: Arc<dyn MarketDataService>, warmup_bars: usize) -> Self {
        Self {
            market_service,
            warmup_bars,
        }
    }

    /// Bars requested for `bank`: the configured amount, or more if an indicator needs it.
    pub fn required_bars(&self, required_by_indicators: usize) -> usize {
        self.warmup_bars.max(required_by_indicators)
    }

    /// Warm up `bank` for `symbol`. Returns the number of bars applied.
    ///
    /// A failed fetch is not fatal: the bank starts cold and fills from live closes.
    pub async fn warmup_bank(
        &self,
        bank: &mut IndicatorBank,
        symbol: &str,
        required_by_indicators: usize,
    ) -> usize {
        let limit = self.required_bars(required_by_indicators);
        if limit == 0 {
            debug!("WarmupService: Warmup disabled for {}", symbol);
            return 0;
        }

        info!(
            "WarmupService: Warming up {} with {} bars (indicators need {})",
            symbol, limit, required_by_indicators
        );

        match self.market_service.historical_bars(symbol, limit).await {
            Ok(bars) => {
                info!(
                    "WarmupService: Fetched {} historical bars for {}",
                    bars.len(),
                    symbol
                );
                let applied = bank.warmup(&bars);

                if applied < required_by_indicators {
                    warn!(
                        "WarmupService: {} only got {} usable bars of {} needed, some indicators stay absent until live closes fill the gap",
                        symbol, applied, required_by_indicators
                    );
                } else {
                    info!(
                        "WarmupService: ✓ Warmup completed successfully for {} with {} bars",
                        symbol, applied
                    );
                }
                applied
            }
            Err(e) => {
                warn!(
                    "WarmupService: Failed to warmup {}: {}. Indicators will start cold",
                    symbol, e
                );
                0
            }
        }
    }
}
