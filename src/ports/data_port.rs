//! Price data access port trait.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;

pub trait PriceDataPort {
    /// Bars for `symbol`, ordered by timestamp ascending.
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<OhlcvBar>, EngineError>;
}
