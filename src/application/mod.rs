// Per-symbol feed loop and warmup
pub mod agents;

// Market data processing
pub mod market_data;
