//! Bar: the market data unit handed to the engine by a price provider.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Timestamp;

/// OHLCV bar for a single symbol at a single decision timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("{symbol} @ {timestamp}: duplicate bar")]
    Duplicate { symbol: String, timestamp: Timestamp },

    #[error("{symbol} @ {timestamp}: OHLC out of order (open={open}, high={high}, low={low}, close={close})")]
    Insane {
        symbol: String,
        timestamp: Timestamp,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

impl Bar {
    /// Returns true if any price field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity: positive prices, high/low bracket open and close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    pub(crate) fn check(&self) -> Result<(), BarError> {
        // Void bars are legal input: they mark a gap the loop must handle.
        if self.is_void() || self.is_sane() {
            return Ok(());
        }
        Err(BarError::Insane {
            symbol: self.symbol.clone(),
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        })
    }
}
