//! Portfolio ledger: sole owner of cash, positions and the fill log.
//!
//! Every mutation of [`PortfolioState`] goes through [`PortfolioLedger::apply_fill`].
//! The ledger also carries a running equity figure updated incrementally by
//! marks and fills; [`PortfolioLedger::reconcile`] recomputes equity from
//! scratch and fails if the two disagree.

pub mod rebalance;

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::domain::{
    FillRecord, IdGen, OrderId, OrderSide, PortfolioState, Position, Timestamp,
};
use crate::error::EngineError;
use crate::execution::{TradeCost, TransactionCostModel};
use crate::sizing::{is_representable, SizingEngine, SHARE_EPSILON};

pub use rebalance::{
    validate_weights, ClipReason, ClippedTarget, MarketSnapshot, OrderOutcome, RebalanceResult,
    RejectedOrder, SkipReason, SkippedTrade,
};

/// Relative equity tolerance used by reconciliation.
pub const RECONCILE_TOLERANCE: f64 = 1e-6;

/// A slice execution ready to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceFill {
    pub timestamp: Timestamp,
    pub order_id: OrderId,
    pub slice_index: usize,
    pub symbol: String,
    pub side: OrderSide,
    pub shares: f64,
    pub price: f64,
    pub cost: TradeCost,
}

/// Ledger contents at a step boundary, enough to undo a failed step.
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    cash: f64,
    positions: BTreeMap<String, Position>,
    unallocated_residual: f64,
    total_commission: f64,
    total_slippage: f64,
    equity_len: usize,
    fills_len: usize,
    marks: BTreeMap<String, f64>,
    running_equity: f64,
}

#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    state: PortfolioState,
    /// Latest valid price per symbol.
    marks: BTreeMap<String, f64>,
    running_equity: f64,
    fills: Vec<FillRecord>,
    ids: IdGen,
    config: EngineConfig,
    sizing: SizingEngine,
    costs: TransactionCostModel,
}

impl PortfolioLedger {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            state: PortfolioState::new(config.initial_capital),
            marks: BTreeMap::new(),
            running_equity: config.initial_capital,
            fills: Vec::new(),
            ids: IdGen::default(),
            config: config.clone(),
            sizing: config.sizing_engine(),
            costs: config.cost_model(),
        })
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn fills(&self) -> &[FillRecord] {
        &self.fills
    }

    pub fn marks(&self) -> &BTreeMap<String, f64> {
        &self.marks
    }

    pub fn mark(&self, symbol: &str) -> Option<f64> {
        self.marks.get(symbol).copied()
    }

    pub fn running_equity(&self) -> f64 {
        self.running_equity
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current weight of `symbol` at its mark.
    pub fn weight(&self, symbol: &str) -> f64 {
        if self.running_equity <= 0.0 {
            return 0.0;
        }
        let Some(pos) = self.state.positions.get(symbol) else {
            return 0.0;
        };
        let price = self.mark(symbol).unwrap_or(pos.avg_cost);
        pos.market_value(price) / self.running_equity
    }

    /// Current weights of all held positions.
    pub fn weights(&self) -> BTreeMap<String, f64> {
        self.state
            .positions
            .keys()
            .map(|sym| (sym.clone(), self.weight(sym)))
            .collect()
    }

    /// Update marks from `prices`. Non-positive or non-finite prices are
    /// ignored, so a symbol keeps its last valid mark.
    pub fn mark_to_market(&mut self, prices: &BTreeMap<String, f64>) {
        for (symbol, &price) in prices {
            if !price.is_finite() || price <= 0.0 {
                continue;
            }
            if let Some(pos) = self.state.positions.get(symbol) {
                let old = self.marks.get(symbol).copied().unwrap_or(pos.avg_cost);
                self.running_equity += pos.shares * (price - old);
            }
            self.marks.insert(symbol.clone(), price);
        }
    }

    /// Move cash into the unallocated residual bucket. Equity is unchanged.
    pub(crate) fn hold_residual(&mut self, amount: f64) {
        let amount = amount.min(self.state.cash).max(0.0);
        self.state.cash -= amount;
        self.state.unallocated_residual += amount;
    }

    /// Return the residual bucket to cash. Equity is unchanged.
    pub(crate) fn sweep_residual(&mut self) {
        self.state.cash += self.state.unallocated_residual;
        self.state.unallocated_residual = 0.0;
    }

    pub(crate) fn next_order_id(&mut self) -> OrderId {
        self.ids.next_order_id()
    }

    pub(crate) fn sizing(&self) -> &SizingEngine {
        &self.sizing
    }

    pub(crate) fn cost_model(&self) -> &TransactionCostModel {
        &self.costs
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            cash: self.state.cash,
            positions: self.state.positions.clone(),
            unallocated_residual: self.state.unallocated_residual,
            total_commission: self.state.total_commission,
            total_slippage: self.state.total_slippage,
            equity_len: self.state.equity_curve.len(),
            fills_len: self.fills.len(),
            marks: self.marks.clone(),
            running_equity: self.running_equity,
        }
    }

    /// Undo everything after `checkpoint`. The equity curve and fill log are
    /// append-only, so truncating them restores their earlier contents.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        self.state.cash = checkpoint.cash;
        self.state.positions = checkpoint.positions;
        self.state.unallocated_residual = checkpoint.unallocated_residual;
        self.state.total_commission = checkpoint.total_commission;
        self.state.total_slippage = checkpoint.total_slippage;
        self.state.equity_curve.truncate(checkpoint.equity_len);
        self.fills.truncate(checkpoint.fills_len);
        self.marks = checkpoint.marks;
        self.running_equity = checkpoint.running_equity;
    }

    /// Consume the ledger, returning final state and the fill log.
    pub fn into_parts(self) -> (PortfolioState, Vec<FillRecord>) {
        (self.state, self.fills)
    }

    /// Apply one slice execution: move cash, update the position, append to
    /// the fill log and update running equity.
    ///
    /// Sells may not exceed held shares; under whole-share sizing the slice
    /// must be integral.
    pub fn apply_fill(&mut self, fill: SliceFill) -> Result<FillRecord, EngineError> {
        if !fill.price.is_finite() || fill.price <= 0.0 {
            return Err(EngineError::invalid_price(&fill.symbol, fill.price));
        }
        if !fill.shares.is_finite() || fill.shares <= 0.0 {
            return Err(EngineError::OrderConstraint(format!(
                "{}: fill quantity must be positive, got {}",
                fill.symbol, fill.shares
            )));
        }
        if !is_representable(fill.shares, self.sizing.policy) {
            return Err(EngineError::OrderConstraint(format!(
                "{}: fill quantity {} is not a whole number of shares",
                fill.symbol, fill.shares
            )));
        }
        let commission = fill.cost.commission.max(0.0);
        let slippage = fill.cost.slippage.max(0.0);
        let gross = fill.shares * fill.price;

        match fill.side {
            OrderSide::Buy => {
                self.state.cash -= gross + commission + slippage;
                self.state
                    .positions
                    .entry(fill.symbol.clone())
                    .and_modify(|pos| pos.add(fill.shares, fill.price))
                    .or_insert_with(|| Position::open(&fill.symbol, fill.shares, fill.price));
            }
            OrderSide::Sell => {
                let held = self.state.shares(&fill.symbol);
                if fill.shares > held + SHARE_EPSILON {
                    return Err(EngineError::OrderConstraint(format!(
                        "{}: sell of {} exceeds held {held}",
                        fill.symbol, fill.shares
                    )));
                }
                self.state.cash += gross - commission - slippage;
                if let Some(pos) = self.state.positions.get_mut(&fill.symbol) {
                    pos.reduce(fill.shares, fill.price);
                    if pos.shares <= SHARE_EPSILON {
                        self.state.positions.remove(&fill.symbol);
                    }
                }
            }
        }

        // Fills happen at the execution price, but the position is valued
        // at the mark: the difference moves equity along with the costs.
        let mark = *self.marks.entry(fill.symbol.clone()).or_insert(fill.price);
        self.running_equity +=
            fill.side.sign() * fill.shares * (mark - fill.price) - commission - slippage;
        self.state.total_commission += commission;
        self.state.total_slippage += slippage;

        let record = FillRecord {
            timestamp: fill.timestamp,
            order_id: fill.order_id,
            slice_index: fill.slice_index,
            symbol: fill.symbol,
            side: fill.side,
            shares: fill.shares,
            price: fill.price,
            commission,
            slippage,
            cash_after: self.state.cash,
        };
        tracing::debug!(
            order = %record.order_id,
            slice = record.slice_index,
            symbol = %record.symbol,
            side = ?record.side,
            shares = record.shares,
            price = record.price,
            cash = record.cash_after,
            "fill applied"
        );
        self.fills.push(record.clone());

        if self.config.reconcile_after_each_fill {
            self.reconcile()?;
        }
        Ok(record)
    }

    /// Recompute equity from cash, residual and marked positions and compare
    /// it against the running figure. Returns the recomputed equity.
    pub fn reconcile(&self) -> Result<f64, EngineError> {
        let actual = self.state.total_value(&self.marks);
        let expected = self.running_equity;
        let tolerance = RECONCILE_TOLERANCE * expected.abs().max(1.0);
        if !actual.is_finite() || (actual - expected).abs() > tolerance {
            return Err(EngineError::Reconciliation { expected, actual });
        }
        Ok(actual)
    }

    /// Mark to `closes`, reconcile and append an equity point.
    ///
    /// Timestamps must strictly increase; a repeated or earlier timestamp is
    /// treated as a ledger integrity failure.
    pub fn record_equity(
        &mut self,
        timestamp: Timestamp,
        closes: &BTreeMap<String, f64>,
    ) -> Result<f64, EngineError> {
        self.mark_to_market(closes);
        let value = self.reconcile()?;
        if let Some(last) = self.state.last_equity() {
            if timestamp <= last.timestamp {
                return Err(EngineError::Reconciliation {
                    expected: last.total_value,
                    actual: value,
                });
            }
        }
        self.state.equity_curve.push(crate::domain::EquityPoint {
            timestamp,
            total_value: value,
        });
        Ok(value)
    }
}
