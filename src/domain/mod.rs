// Spectral regime model
pub mod eigenstate;

// Incremental indicators (EMA, RSI, MACD)
pub mod indicators;

// Candles and trades
pub mod market;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
