//! Point-in-time market view handed to strategies.

use std::collections::BTreeMap;

use crate::data::PriceProvider;
use crate::domain::{Bar, Timestamp};

/// Bars strictly before the decision timestamp.
///
/// The current bar's open is reachable only when the engine executes at the
/// open; its close, high, low and volume never are.
#[derive(Clone, Copy)]
pub struct HistoryView<'a> {
    provider: &'a dyn PriceProvider,
    now: Timestamp,
    open_visible: bool,
}

impl<'a> HistoryView<'a> {
    pub(crate) fn new(provider: &'a dyn PriceProvider, now: Timestamp, open_visible: bool) -> Self {
        Self {
            provider,
            now,
            open_visible,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn symbols(&self) -> Vec<String> {
        self.provider.symbols()
    }

    /// Every bar for `symbol` before now, oldest first.
    pub fn bars(&self, symbol: &str) -> &'a [Bar] {
        self.provider.bars_before(symbol, self.now)
    }

    /// The `n` most recent bars before now.
    pub fn last_bars(&self, symbol: &str, n: usize) -> &'a [Bar] {
        let bars = self.bars(symbol);
        &bars[bars.len().saturating_sub(n)..]
    }

    /// Closes of usable bars before now, oldest first. Void bars are dropped.
    pub fn closes(&self, symbol: &str) -> Vec<f64> {
        self.bars(symbol)
            .iter()
            .filter(|b| b.is_sane())
            .map(|b| b.close)
            .collect()
    }

    pub fn last_close(&self, symbol: &str) -> Option<f64> {
        self.bars(symbol)
            .iter()
            .rev()
            .find(|b| b.is_sane())
            .map(|b| b.close)
    }

    /// Today's open, if the execution policy exposes it and it is usable.
    pub fn current_open(&self, symbol: &str) -> Option<f64> {
        if !self.open_visible {
            return None;
        }
        self.provider
            .get_bar(symbol, self.now)
            .map(|b| b.open)
            .filter(|p| p.is_finite() && *p > 0.0)
    }
}

impl std::fmt::Debug for HistoryView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryView")
            .field("now", &self.now)
            .field("open_visible", &self.open_visible)
            .finish()
    }
}

/// Everything a strategy may look at when deciding at one step.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub timestamp: Timestamp,
    pub step: usize,
    pub history: HistoryView<'a>,
    /// Position weights at the last recorded marks.
    pub current_weights: &'a BTreeMap<String, f64>,
    pub equity: f64,
}
