use thiserror::Error;

/// Errors related to market data ingestion and connectivity
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("Invalid trade: {reason}")]
    InvalidTrade { reason: String },

    #[error("Stale trade at {timestamp_ms}: bucket {bucket_ms} is older than open bucket {open_bucket_ms}")]
    StaleTrade {
        timestamp_ms: i64,
        bucket_ms: i64,
        open_bucket_ms: i64,
    },

    #[error("Subscription to {symbol} failed: {reason}")]
    SubscriptionFailed { symbol: String, reason: String },
}

impl MarketDataError {
    /// Whether the error concerns a single trade and the stream may carry on.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MarketDataError::InvalidTrade { .. } | MarketDataError::StaleTrade { .. }
        )
    }
}
