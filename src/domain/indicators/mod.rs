//! Incremental technical indicators.
//!
//! Every indicator answers two kinds of question:
//! - **confirmed**: `update` folds in the close of a finalized candle and mutates state.
//! - **preview**: `preview` projects the value as if `candidate` became the next close,
//!   without touching state. It takes `&self`, so the compiler enforces the non-mutation.
//!
//! Before an indicator's minimum window is met both `value` and `preview` return `None`.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod settings;

pub use ema::Ema;
pub use macd::{Macd, MacdValue};
pub use rsi::Rsi;
pub use settings::{IndicatorSettings, MacdSettings};

/// Shared confirmed/preview contract.
pub trait Indicator {
    /// What a confirmed close carries for this indicator.
    type Input;
    /// What the indicator reports.
    type Output;

    /// Apply a confirmed input.
    fn update(&mut self, input: Self::Input);

    /// Latest confirmed value.
    fn value(&self) -> Option<Self::Output>;

    /// Value if `candidate` were the next confirmed close.
    fn preview(&self, candidate: f64) -> Option<Self::Output>;

    /// Whether the minimum window has been met.
    fn is_ready(&self) -> bool {
        self.value().is_some()
    }
}
