// Candles and trades
pub mod candle;

pub use candle::{Candle, RawTrade, TradeEvent};
