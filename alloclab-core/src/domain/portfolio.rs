//! Portfolio state: cash, positions, residual cash and the equity curve.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::position::Position;
use super::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: Timestamp,
    pub total_value: f64,
}

/// Aggregate portfolio state owned by the ledger.
///
/// `cash` and `unallocated_residual` are disjoint: the residual holds the
/// part of the last rebalance's buy budget that could not be converted into
/// shares. Positions are keyed by symbol in a `BTreeMap` so every sum over
/// them runs in the same order on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<String, Position>,
    pub unallocated_residual: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub total_commission: f64,
    pub total_slippage: f64,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            unallocated_residual: 0.0,
            equity_curve: Vec::new(),
            total_commission: 0.0,
            total_slippage: 0.0,
        }
    }

    /// Cash plus residual: everything not invested in positions.
    pub fn liquid(&self) -> f64 {
        self.cash + self.unallocated_residual
    }

    /// Total value given mark prices. Positions without a mark are valued at cost.
    pub fn total_value(&self, marks: &BTreeMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .iter()
            .map(|(sym, pos)| {
                let price = marks.get(sym).copied().unwrap_or(pos.avg_cost);
                pos.market_value(price)
            })
            .sum();
        self.liquid() + position_value
    }

    pub fn shares(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.shares)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn last_equity(&self) -> Option<&EquityPoint> {
        self.equity_curve.last()
    }
}
