//! Rebalancing: target weights in, orders, slices and fills out.
//!
//! A rebalance is planned entirely against the equity at the snapshot
//! prices, then executed sells first and buys second, symbols in lexical
//! order within each side. Per-order failures cancel that order only; a
//! malformed target map rejects the whole call before anything mutates.
//!
//! The weight cap applies to equity after the rebalance's own costs. Plans
//! are rebuilt with a growing cost allowance until the estimated costs of
//! the plan fit inside the allowance it was built with.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{PortfolioLedger, SliceFill};
use crate::domain::{
    ExecutionSlice, FillRecord, Order, OrderId, OrderSide, OrderStatus, TargetWeights,
    TimeWindow, Timestamp,
};
use crate::error::EngineError;
use crate::execution::{generate_slices, Liquidity, TradeCost};

/// Slack on the weight sum before a target map is rejected.
pub const WEIGHT_EPSILON: f64 = 1e-9;
/// Slack on drift and cap comparisons, as a fraction of equity.
pub const DRIFT_EPSILON: f64 = 1e-9;
/// Planning passes before the cost allowance is taken as settled.
const MAX_COST_PASSES: usize = 8;

/// Prices and liquidity the ledger trades against at one decision point.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub timestamp: Timestamp,
    /// Execution price per symbol.
    pub prices: BTreeMap<String, f64>,
    pub liquidity: BTreeMap<String, Liquidity>,
    /// Symbols that may not trade this step. Their positions are left as-is.
    pub halted: BTreeSet<String>,
    /// Next decision timestamp. Execution windows end no later than this.
    pub window_end: Option<Timestamp>,
}

impl MarketSnapshot {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            prices: BTreeMap::new(),
            liquidity: BTreeMap::new(),
            halted: BTreeSet::new(),
            window_end: None,
        }
    }

    pub fn with_window_end(mut self, end: Timestamp) -> Self {
        self.window_end = Some(end);
        self
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    pub fn with_liquidity(mut self, symbol: &str, liquidity: Liquidity) -> Self {
        self.liquidity.insert(symbol.to_string(), liquidity);
        self
    }

    pub fn with_halted(mut self, symbol: &str) -> Self {
        self.halted.insert(symbol.to_string());
        self
    }

    /// Execution price if it is usable (finite and positive).
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices
            .get(symbol)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    WithinThreshold { drift: f64 },
    Halted,
    /// Held position left at its size by a discrete hold.
    Kept,
    /// Sizing produced zero shares (dust rule or less than one whole share).
    BelowMinimum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrade {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClipReason {
    MaxWeight,
    Cash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClippedTarget {
    pub symbol: String,
    pub requested_value: f64,
    pub applied_value: f64,
    pub reason: ClipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedOrder {
    pub symbol: String,
    pub side: Option<OrderSide>,
    pub error: EngineError,
}

/// Summary of a parent order once it reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: OrderSide,
    pub requested_value: f64,
    pub quantity: f64,
    pub filled_quantity: f64,
    pub slices: usize,
    pub status: OrderStatus,
    pub commission: f64,
    pub slippage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceResult {
    pub timestamp: Timestamp,
    /// Equity the targets were sized against.
    pub equity: f64,
    /// Estimated costs of this rebalance, netted out of equity for the cap.
    pub cost_allowance: f64,
    pub orders: Vec<OrderOutcome>,
    pub skipped: Vec<SkippedTrade>,
    pub clipped: Vec<ClippedTarget>,
    pub rejected: Vec<RejectedOrder>,
    pub fills: Vec<FillRecord>,
    /// Unallocated residual after the rebalance.
    pub residual: f64,
}

impl RebalanceResult {
    fn new(timestamp: Timestamp, equity: f64) -> Self {
        Self {
            timestamp,
            equity,
            cost_allowance: 0.0,
            orders: Vec::new(),
            skipped: Vec::new(),
            clipped: Vec::new(),
            rejected: Vec::new(),
            fills: Vec::new(),
            residual: 0.0,
        }
    }

    pub fn traded(&self) -> bool {
        !self.fills.is_empty()
    }
}

struct TradePlan {
    symbol: String,
    value: f64,
    price: f64,
    over_cap: bool,
}

struct PricedOrder {
    window: TimeWindow,
    slices: Vec<ExecutionSlice>,
    costs: Vec<TradeCost>,
}

impl PricedOrder {
    /// Cash a buy consumes: notional plus every slice's costs.
    fn required(&self, price: f64) -> f64 {
        self.slices
            .iter()
            .zip(&self.costs)
            .map(|(s, c)| s.quantity * price + c.total())
            .sum()
    }
}

/// Reject non-finite or negative weights and sums above one.
pub fn validate_weights(targets: &TargetWeights) -> Result<(), EngineError> {
    let mut sum = 0.0;
    for (symbol, &weight) in targets {
        if !weight.is_finite() || weight < 0.0 {
            return Err(EngineError::OrderConstraint(format!(
                "{symbol}: target weight must be finite and non-negative, got {weight}"
            )));
        }
        sum += weight;
    }
    if sum > 1.0 + WEIGHT_EPSILON {
        return Err(EngineError::OrderConstraint(format!(
            "target weights sum to {sum}, above 1"
        )));
    }
    Ok(())
}

impl PortfolioLedger {
    /// Move the portfolio toward `targets` at the snapshot's prices.
    ///
    /// Returns `Err` only for an invalid target map (nothing mutated) or a
    /// fatal reconciliation failure. Everything else is reported inside the
    /// result.
    pub fn allocate_to_targets(
        &mut self,
        targets: &TargetWeights,
        snapshot: &MarketSnapshot,
    ) -> Result<RebalanceResult, EngineError> {
        self.allocate_keeping(targets, &BTreeSet::new(), snapshot)
    }

    /// [`allocate_to_targets`](Self::allocate_to_targets) that leaves the
    /// positions in `keep` at their current size. A kept position is still
    /// trimmed if it is over the weight cap.
    pub fn allocate_keeping(
        &mut self,
        targets: &TargetWeights,
        keep: &BTreeSet<String>,
        snapshot: &MarketSnapshot,
    ) -> Result<RebalanceResult, EngineError> {
        validate_weights(targets)?;
        self.sweep_residual();
        self.mark_to_market(&snapshot.prices);

        let equity = self.running_equity();
        if equity <= 0.0 || !equity.is_finite() {
            tracing::warn!(equity, at = %snapshot.timestamp, "no equity to allocate");
            return Ok(RebalanceResult::new(snapshot.timestamp, equity));
        }

        let (mut result, sells, buys) = self.plan_with_costs(targets, keep, snapshot, equity);

        let reserve = if self.config().allow_cash_buffer_breach {
            0.0
        } else {
            equity * self.config().min_cash_buffer
        };
        for plan in sells {
            self.execute_sell(plan, snapshot, &mut result)?;
        }
        for plan in buys {
            self.execute_buy(plan, snapshot, reserve, &mut result)?;
        }

        self.reconcile()?;
        result.residual = self.state().unallocated_residual;
        tracing::debug!(
            at = %snapshot.timestamp,
            equity,
            orders = result.orders.len(),
            fills = result.fills.len(),
            skipped = result.skipped.len(),
            rejected = result.rejected.len(),
            "rebalance complete"
        );
        Ok(result)
    }

    fn plan_with_costs(
        &self,
        targets: &TargetWeights,
        keep: &BTreeSet<String>,
        snapshot: &MarketSnapshot,
        equity: f64,
    ) -> (RebalanceResult, Vec<TradePlan>, Vec<TradePlan>) {
        let mut allowance = 0.0_f64;
        let mut pass = 1;
        loop {
            let mut result = RebalanceResult::new(snapshot.timestamp, equity);
            result.cost_allowance = allowance;
            let (sells, buys) =
                self.plan_trades(targets, keep, snapshot, equity, allowance, &mut result);
            let estimate = self.estimate_costs(&sells, &buys, snapshot);
            if estimate <= allowance || pass == MAX_COST_PASSES {
                return (result, sells, buys);
            }
            allowance = allowance.max(estimate);
            pass += 1;
        }
    }

    fn plan_trades(
        &self,
        targets: &TargetWeights,
        keep: &BTreeSet<String>,
        snapshot: &MarketSnapshot,
        equity: f64,
        cost_allowance: f64,
        result: &mut RebalanceResult,
    ) -> (Vec<TradePlan>, Vec<TradePlan>) {
        let investable = equity * (1.0 - self.config().min_cash_buffer);
        let cap = (equity - cost_allowance).max(0.0) * self.config().max_position_weight;
        let threshold = self.config().rebalance_drift_threshold + DRIFT_EPSILON;

        let symbols: BTreeSet<&String> = targets
            .keys()
            .chain(self.state().positions.keys())
            .collect();

        let mut sells = Vec::new();
        let mut buys = Vec::new();
        for symbol in symbols {
            let weight = targets.get(symbol).copied().unwrap_or(0.0);
            let held = self.state().shares(symbol);
            if weight == 0.0 && held == 0.0 {
                continue;
            }
            if snapshot.halted.contains(symbol) {
                result.skipped.push(SkippedTrade {
                    symbol: symbol.clone(),
                    reason: SkipReason::Halted,
                });
                continue;
            }
            let Some(price) = snapshot.price(symbol) else {
                let raw = snapshot.prices.get(symbol).copied().unwrap_or(f64::NAN);
                result.rejected.push(RejectedOrder {
                    symbol: symbol.clone(),
                    side: None,
                    error: EngineError::invalid_price(symbol, raw),
                });
                continue;
            };

            let current = held * price;
            let over_cap = current > cap + DRIFT_EPSILON * equity;
            if held > 0.0 && keep.contains(symbol) {
                if over_cap {
                    sells.push(TradePlan {
                        symbol: symbol.clone(),
                        value: current - cap,
                        price,
                        over_cap,
                    });
                } else {
                    result.skipped.push(SkippedTrade {
                        symbol: symbol.clone(),
                        reason: SkipReason::Kept,
                    });
                }
                continue;
            }

            let desired = investable * weight;
            let target_value = desired.min(cap);
            if desired > cap + DRIFT_EPSILON * equity {
                result.clipped.push(ClippedTarget {
                    symbol: symbol.clone(),
                    requested_value: desired,
                    applied_value: target_value,
                    reason: ClipReason::MaxWeight,
                });
            }

            let drift = (target_value - current) / equity;
            if drift.abs() <= threshold && !over_cap {
                result.skipped.push(SkippedTrade {
                    symbol: symbol.clone(),
                    reason: SkipReason::WithinThreshold { drift },
                });
                continue;
            }

            let plan = TradePlan {
                symbol: symbol.clone(),
                value: (target_value - current).abs(),
                price,
                over_cap,
            };
            if drift < 0.0 {
                sells.push(plan);
            } else {
                buys.push(plan);
            }
        }
        (sells, buys)
    }

    fn execute_sell(
        &mut self,
        plan: TradePlan,
        snapshot: &MarketSnapshot,
        result: &mut RebalanceResult,
    ) -> Result<(), EngineError> {
        let quantity = match self.release_quantity(&plan) {
            Ok(q) => q,
            Err(e) => {
                reject(result, &plan.symbol, OrderSide::Sell, e);
                return Ok(());
            }
        };
        if quantity <= 0.0 {
            result.skipped.push(SkippedTrade {
                symbol: plan.symbol,
                reason: SkipReason::BelowMinimum,
            });
            return Ok(());
        }

        let priced = match self.price_order(&plan.symbol, quantity, plan.price, snapshot) {
            Ok(p) => p,
            Err(e) => {
                reject(result, &plan.symbol, OrderSide::Sell, e);
                return Ok(());
            }
        };
        self.fill_order(OrderSide::Sell, &plan, quantity, priced, result)
    }

    fn execute_buy(
        &mut self,
        plan: TradePlan,
        snapshot: &MarketSnapshot,
        reserve: f64,
        result: &mut RebalanceResult,
    ) -> Result<(), EngineError> {
        let available = (self.state().cash - reserve).max(0.0);
        let tolerance = DRIFT_EPSILON * available.max(1.0);
        if available <= 0.0 {
            reject(
                result,
                &plan.symbol,
                OrderSide::Buy,
                EngineError::InsufficientCash {
                    symbol: plan.symbol.clone(),
                    required: plan.value,
                    available,
                },
            );
            return Ok(());
        }

        let mut value = plan.value;
        if value > available {
            value = available;
        }
        let (mut sized, mut priced) = match self.size_buy(&plan, value, snapshot) {
            Ok(sp) => sp,
            Err(e) => {
                reject(result, &plan.symbol, OrderSide::Buy, e);
                return Ok(());
            }
        };

        // Costs are monotone in size, so shrinking by the overshoot fits.
        let overshoot = priced.required(plan.price) - available;
        if overshoot > tolerance {
            value = (value - overshoot).max(0.0);
            match self.size_buy(&plan, value, snapshot) {
                Ok(sp) => (sized, priced) = sp,
                Err(e) => {
                    reject(result, &plan.symbol, OrderSide::Buy, e);
                    return Ok(());
                }
            }
            let required = priced.required(plan.price);
            if required > available + tolerance {
                reject(
                    result,
                    &plan.symbol,
                    OrderSide::Buy,
                    EngineError::InsufficientCash {
                        symbol: plan.symbol.clone(),
                        required,
                        available,
                    },
                );
                return Ok(());
            }
        }
        if value < plan.value - tolerance {
            result.clipped.push(ClippedTarget {
                symbol: plan.symbol.clone(),
                requested_value: plan.value,
                applied_value: value,
                reason: ClipReason::Cash,
            });
        }

        if sized.shares <= 0.0 {
            result.skipped.push(SkippedTrade {
                symbol: plan.symbol.clone(),
                reason: SkipReason::BelowMinimum,
            });
        } else {
            self.fill_order(OrderSide::Buy, &plan, sized.shares, priced, result)?;
        }
        let spare = (self.state().cash - reserve).max(0.0);
        self.hold_residual(sized.residual.min(spare));
        Ok(())
    }

    fn release_quantity(&self, plan: &TradePlan) -> Result<f64, EngineError> {
        let held = self.state().shares(&plan.symbol);
        // Cap trims ignore the dust rule so the cap always holds.
        let min_value = if plan.over_cap {
            0.0
        } else {
            self.sizing().min_position_value
        };
        crate::sizing::calculate_release(
            plan.value,
            plan.price,
            held,
            self.sizing().policy,
            min_value,
        )
    }

    /// Upper bound on the commission and slippage the plans will pay.
    /// Buys are estimated at their full planned value; cash clipping only
    /// shrinks them.
    fn estimate_costs(
        &self,
        sells: &[TradePlan],
        buys: &[TradePlan],
        snapshot: &MarketSnapshot,
    ) -> f64 {
        let sold = sells
            .iter()
            .filter_map(|plan| Some((plan, self.release_quantity(plan).ok()?)));
        let bought = buys.iter().filter_map(|plan| {
            let sized = self.sizing().calculate_shares(plan.value, plan.price).ok()?;
            Some((plan, sized.shares))
        });
        sold.chain(bought)
            .filter(|(_, quantity)| *quantity > 0.0)
            .filter_map(|(plan, quantity)| {
                self.price_order(&plan.symbol, quantity, plan.price, snapshot)
                    .ok()
            })
            .map(|priced| priced.costs.iter().map(TradeCost::total).sum::<f64>())
            .sum()
    }

    fn size_buy(
        &self,
        plan: &TradePlan,
        value: f64,
        snapshot: &MarketSnapshot,
    ) -> Result<(crate::sizing::SizedQuantity, PricedOrder), EngineError> {
        let sized = self
            .sizing()
            .calculate_shares(value, plan.price)
            .map_err(|e| e.with_symbol(&plan.symbol))?;
        let priced = self.price_order(&plan.symbol, sized.shares, plan.price, snapshot)?;
        Ok((sized, priced))
    }

    /// Slice the parent quantity and cost every slice.
    fn price_order(
        &self,
        symbol: &str,
        quantity: f64,
        price: f64,
        snapshot: &MarketSnapshot,
    ) -> Result<PricedOrder, EngineError> {
        let config = self.config();
        let mut window = TimeWindow::new(snapshot.timestamp, config.execution_window_minutes);
        if let Some(end) = snapshot.window_end {
            window = window.ending_by(end);
        }
        let slices = generate_slices(
            quantity,
            &config.execution_algorithm,
            config.sizing_policy,
            &window,
        )
        .map_err(|e| e.with_symbol(symbol))?;
        let liquidity = snapshot.liquidity.get(symbol).copied().unwrap_or_default();
        let costs = slices
            .iter()
            .map(|s| self.cost_model().estimate(s.quantity, price, &liquidity))
            .collect();
        Ok(PricedOrder {
            window,
            slices,
            costs,
        })
    }

    fn fill_order(
        &mut self,
        side: OrderSide,
        plan: &TradePlan,
        quantity: f64,
        priced: PricedOrder,
        result: &mut RebalanceResult,
    ) -> Result<(), EngineError> {
        let id = self.next_order_id();
        let mut order = Order::new(
            id,
            &plan.symbol,
            side,
            plan.value,
            quantity,
            self.config().execution_algorithm.clone(),
            priced.window,
        );
        let mut commission = 0.0;
        let mut slippage = 0.0;

        for (slice, cost) in priced.slices.iter().zip(&priced.costs) {
            if slice.quantity <= 0.0 {
                continue;
            }
            let applied = self.apply_fill(SliceFill {
                timestamp: slice.scheduled_at,
                order_id: id,
                slice_index: slice.index,
                symbol: plan.symbol.clone(),
                side,
                shares: slice.quantity,
                price: plan.price,
                cost: *cost,
            });
            match applied {
                Ok(record) => {
                    order.record_fill(record.shares)?;
                    commission += record.commission;
                    slippage += record.slippage;
                    result.fills.push(record);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    order.cancel(e.to_string());
                    reject(result, &plan.symbol, side, e);
                    break;
                }
            }
        }

        result.orders.push(OrderOutcome {
            order_id: order.id,
            symbol: order.symbol,
            side,
            requested_value: order.requested_value,
            quantity: order.quantity,
            filled_quantity: order.filled_quantity,
            slices: priced.slices.len(),
            status: order.status,
            commission,
            slippage,
        });
        Ok(())
    }
}

fn reject(result: &mut RebalanceResult, symbol: &str, side: OrderSide, error: EngineError) {
    tracing::warn!(symbol, ?side, %error, "order rejected");
    result.rejected.push(RejectedOrder {
        symbol: symbol.to_string(),
        side: Some(side),
        error,
    });
}
