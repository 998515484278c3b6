//! Engine error taxonomy.
//!
//! Propagation rules are enforced by the callers, not by the type:
//! - `DataGap` is resolved by the loop per `DataGapPolicy` and becomes a warning.
//! - `InvalidPrice`, `OrderConstraint` and `InsufficientCash` abort a single
//!   order; the position holds at its prior allocation.
//! - `Reconciliation` is always fatal for the run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Timestamp;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid price for '{symbol}': {price}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("insufficient cash for '{symbol}': need {required:.2}, available {available:.2}")]
    InsufficientCash {
        symbol: String,
        required: f64,
        available: f64,
    },

    #[error("order constraint violated: {0}")]
    OrderConstraint(String),

    #[error("data gap for '{symbol}' at {timestamp}")]
    DataGap { symbol: String, timestamp: Timestamp },

    #[error("reconciliation failed: expected equity {expected}, recomputed {actual}")]
    Reconciliation { expected: f64, actual: f64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Stable classification used for warnings and diagnostics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPrice { .. } => ErrorKind::InvalidPrice,
            Self::InsufficientCash { .. } => ErrorKind::InsufficientCash,
            Self::OrderConstraint(_) => ErrorKind::OrderConstraint,
            Self::DataGap { .. } => ErrorKind::DataGap,
            Self::Reconciliation { .. } => ErrorKind::Reconciliation,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Fatal errors stop the run; everything else is recorded and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Reconciliation { .. } | Self::InvalidConfig(_)
        )
    }

    /// Attach a symbol to errors raised by symbol-agnostic helpers (sizing).
    pub fn with_symbol(self, symbol: &str) -> Self {
        match self {
            Self::InvalidPrice { symbol: s, price } if s.is_empty() => Self::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            },
            Self::OrderConstraint(msg) => Self::OrderConstraint(format!("{symbol}: {msg}")),
            other => other,
        }
    }

    pub(crate) fn invalid_price(symbol: &str, price: f64) -> Self {
        Self::InvalidPrice {
            symbol: symbol.to_string(),
            price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidPrice,
    InsufficientCash,
    OrderConstraint,
    DataGap,
    Reconciliation,
    InvalidConfig,
}
