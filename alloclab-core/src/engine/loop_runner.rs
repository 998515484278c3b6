//! Step-by-step backtest loop.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{DataGapPolicy, EngineConfig, ExecutionPricePolicy};
use crate::data::{estimate_liquidity, PriceProvider};
use crate::domain::{PortfolioState, TargetWeights, Timestamp};
use crate::error::EngineError;
use crate::ledger::{
    ClipReason, MarketSnapshot, OrderOutcome, PortfolioLedger, RebalanceResult, SkipReason,
};
use crate::strategy::{kept_symbols, resolve_targets, DecisionContext, HistoryView, Strategy};

use super::state::{
    BacktestResult, BacktestWarning, LoopState, RunOutcome, StepPhase, WarningKind,
};

/// Data quality threshold: warn if a symbol's gap rate exceeds this fraction.
const GAP_RATE_THRESHOLD: f64 = 0.10;

enum StepOutcome {
    Recorded,
    Skipped,
}

type StepError = (StepPhase, EngineError);

/// Targets plus the held symbols they leave at their current size.
type Decision = (TargetWeights, BTreeSet<String>);

/// One backtest run. Owns the ledger; borrows the strategy and price feed.
pub struct BacktestLoop<'a> {
    strategy: &'a dyn Strategy,
    prices: &'a dyn PriceProvider,
    config: EngineConfig,
    ledger: PortfolioLedger,
    state: LoopState,
    last_decision: Option<Decision>,
    warnings: Vec<BacktestWarning>,
    orders: Vec<OrderOutcome>,
    gap_counts: BTreeMap<String, usize>,
    steps_recorded: usize,
    steps_skipped: usize,
}

impl<'a> BacktestLoop<'a> {
    pub fn new(
        strategy: &'a dyn Strategy,
        prices: &'a dyn PriceProvider,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let ledger = PortfolioLedger::new(config)?;
        Ok(Self {
            strategy,
            prices,
            config: config.clone(),
            ledger,
            state: LoopState::Initialized,
            last_decision: None,
            warnings: Vec::new(),
            orders: Vec::new(),
            gap_counts: BTreeMap::new(),
            steps_recorded: 0,
            steps_skipped: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    /// Run every step of the calendar.
    pub fn run(mut self) -> BacktestResult {
        let prices = self.prices;
        let calendar = prices.calendar();
        tracing::debug!(
            strategy = self.strategy.name(),
            steps = calendar.len(),
            "backtest start"
        );

        let mut outcome = RunOutcome::Completed;
        for (step, &t) in calendar.iter().enumerate() {
            self.state = LoopState::Running { step };
            let checkpoint = self.ledger.checkpoint();
            let orders_len = self.orders.len();

            match self.step(step, t, calendar.get(step + 1).copied()) {
                Ok(StepOutcome::Recorded) => self.steps_recorded += 1,
                Ok(StepOutcome::Skipped) => self.steps_skipped += 1,
                Err((phase, error)) => {
                    tracing::error!(at = %t, ?phase, %error, "backtest failed");
                    self.ledger.rollback(checkpoint);
                    self.orders.truncate(orders_len);
                    self.state = LoopState::Failed;
                    outcome = RunOutcome::Failed {
                        error,
                        failed_at: Some(t),
                        phase: Some(phase),
                    };
                    break;
                }
            }
        }

        if matches!(outcome, RunOutcome::Completed) {
            self.state = LoopState::Completed;
            self.data_quality_warnings(calendar.len());
            tracing::debug!(
                recorded = self.steps_recorded,
                skipped = self.steps_skipped,
                fills = self.ledger.fills().len(),
                equity = self.ledger.running_equity(),
                "backtest complete"
            );
        }
        self.finish(outcome)
    }

    /// `next` is the following calendar timestamp. Execution windows close
    /// before it.
    fn step(
        &mut self,
        step: usize,
        t: Timestamp,
        next: Option<Timestamp>,
    ) -> Result<StepOutcome, StepError> {
        let open_visible = self.config.execution_price == ExecutionPricePolicy::Open;
        let history = HistoryView::new(self.prices, t, open_visible);
        let weights = self.ledger.weights();

        // ─── Fetch signal ───
        let ctx = DecisionContext {
            timestamp: t,
            step,
            history,
            current_weights: &weights,
            equity: self.ledger.running_equity(),
        };
        let signal = self.strategy.decide(&ctx);

        // ─── Compute targets ───
        let decision = match signal {
            Some(signal) => {
                let targets =
                    resolve_targets(&signal, &weights, self.config.max_position_weight);
                let keep = kept_symbols(&signal, &weights);
                self.last_decision = Some((targets.clone(), keep.clone()));
                Some((targets, keep))
            }
            None => {
                self.warn(
                    Some(t),
                    None,
                    WarningKind::MissingSignal,
                    format!("{} produced no signal", self.strategy.name()),
                );
                match self.config.data_gap_policy {
                    DataGapPolicy::Skip => {
                        self.warn(Some(t), None, WarningKind::StepSkipped, "no signal".into());
                        return Ok(StepOutcome::Skipped);
                    }
                    DataGapPolicy::Hold => self.last_decision.clone(),
                }
            }
        };

        // ─── Execute ───
        let mut needed: BTreeSet<String> = self.ledger.state().positions.keys().cloned().collect();
        if let Some((targets, _)) = &decision {
            needed.extend(
                targets
                    .iter()
                    .filter(|(_, w)| **w > 0.0)
                    .map(|(s, _)| s.clone()),
            );
        }

        let mut snapshot = MarketSnapshot::new(t);
        snapshot.window_end = next;
        let mut gaps = Vec::new();
        for symbol in &needed {
            match self.execution_price(&history, symbol, t) {
                Some(price) => {
                    let lookback = history.last_bars(symbol, self.config.cost_lookback);
                    snapshot.prices.insert(symbol.clone(), price);
                    snapshot
                        .liquidity
                        .insert(symbol.clone(), estimate_liquidity(lookback));
                }
                None => gaps.push(symbol.clone()),
            }
        }

        for symbol in &gaps {
            *self.gap_counts.entry(symbol.clone()).or_default() += 1;
            let gap = EngineError::DataGap {
                symbol: symbol.clone(),
                timestamp: t,
            };
            self.warn(Some(t), Some(symbol.as_str()), WarningKind::DataGap, gap.to_string());
        }
        if !gaps.is_empty() {
            match self.config.data_gap_policy {
                DataGapPolicy::Skip => {
                    self.warn(
                        Some(t),
                        None,
                        WarningKind::StepSkipped,
                        format!("data gap in {}", gaps.join(", ")),
                    );
                    return Ok(StepOutcome::Skipped);
                }
                DataGapPolicy::Hold => snapshot.halted.extend(gaps),
            }
        }

        if let Some((targets, keep)) = &decision {
            match self.ledger.allocate_keeping(targets, keep, &snapshot) {
                Ok(result) => self.record_rebalance(t, result),
                Err(error) if error.is_fatal() => return Err((StepPhase::Execute, error)),
                Err(error) => {
                    self.warn(
                        Some(t),
                        None,
                        WarningKind::RebalanceRejected,
                        error.to_string(),
                    );
                }
            }
        }

        // ─── Record ───
        let closes: BTreeMap<String, f64> = self
            .ledger
            .state()
            .positions
            .keys()
            .filter_map(|sym| {
                self.prices
                    .get_bar(sym, t)
                    .filter(|b| b.is_sane())
                    .map(|b| (sym.clone(), b.close))
            })
            .collect();
        let equity = self
            .ledger
            .record_equity(t, &closes)
            .map_err(|e| (StepPhase::Record, e))?;
        tracing::debug!(step, at = %t, equity, "step recorded");
        Ok(StepOutcome::Recorded)
    }

    fn record_rebalance(&mut self, t: Timestamp, result: RebalanceResult) {
        for rejected in &result.rejected {
            self.warn(
                Some(t),
                Some(rejected.symbol.as_str()),
                WarningKind::OrderRejected,
                rejected.error.to_string(),
            );
        }
        for skipped in &result.skipped {
            if skipped.reason == SkipReason::BelowMinimum {
                self.warn(
                    Some(t),
                    Some(skipped.symbol.as_str()),
                    WarningKind::OrderSkipped,
                    format!("{}: trade sized to zero shares", skipped.symbol),
                );
            }
        }
        for clipped in &result.clipped {
            if clipped.reason == ClipReason::Cash {
                self.warn(
                    Some(t),
                    Some(clipped.symbol.as_str()),
                    WarningKind::OrderClipped,
                    format!(
                        "{}: buy of {:.2} clipped to {:.2} by available cash",
                        clipped.symbol, clipped.requested_value, clipped.applied_value
                    ),
                );
            }
        }
        self.orders.extend(result.orders);
    }

    /// Price orders decided at `t` execute at. `None` is a data gap.
    ///
    /// A usable bar at `t` is required under both policies: equity is
    /// recorded at its close.
    fn execution_price(&self, history: &HistoryView<'_>, symbol: &str, t: Timestamp) -> Option<f64> {
        let bar = self.prices.get_bar(symbol, t).filter(|b| b.is_sane())?;
        match self.config.execution_price {
            ExecutionPricePolicy::Open => Some(bar.open),
            ExecutionPricePolicy::PreviousClose => history.last_close(symbol),
        }
    }

    fn warn(
        &mut self,
        timestamp: Option<Timestamp>,
        symbol: Option<&str>,
        kind: WarningKind,
        message: String,
    ) {
        tracing::warn!(?kind, symbol = symbol.unwrap_or("-"), %message, "backtest warning");
        self.warnings.push(BacktestWarning {
            timestamp,
            symbol: symbol.map(str::to_string),
            kind,
            message,
        });
    }

    fn data_quality_warnings(&mut self, total_steps: usize) {
        if total_steps == 0 {
            return;
        }
        let noisy: Vec<(String, usize)> = self
            .gap_counts
            .iter()
            .filter(|(_, n)| **n as f64 / total_steps as f64 > GAP_RATE_THRESHOLD)
            .map(|(s, n)| (s.clone(), *n))
            .collect();
        for (symbol, count) in noisy {
            let rate = count as f64 / total_steps as f64;
            self.warn(
                None,
                Some(symbol.as_str()),
                WarningKind::DataQuality,
                format!(
                    "{symbol}: {:.1}% of steps had a data gap ({count}/{total_steps})",
                    rate * 100.0
                ),
            );
        }
    }

    fn finish(self, outcome: RunOutcome) -> BacktestResult {
        let (final_state, fills) = self.ledger.into_parts();
        BacktestResult {
            equity_curve: final_state.equity_curve.clone(),
            fills,
            orders: self.orders,
            warnings: self.warnings,
            outcome,
            final_state,
            steps_recorded: self.steps_recorded,
            steps_skipped: self.steps_skipped,
        }
    }
}

/// Run `strategy` over `prices` with `config`.
///
/// Never panics on bad input: an invalid config comes back as a failed
/// result holding the untouched initial state.
pub fn run_backtest(
    strategy: &dyn Strategy,
    prices: &dyn PriceProvider,
    config: &EngineConfig,
) -> BacktestResult {
    match BacktestLoop::new(strategy, prices, config) {
        Ok(backtest) => backtest.run(),
        Err(error) => {
            tracing::error!(%error, "backtest not started");
            BacktestResult {
                equity_curve: Vec::new(),
                fills: Vec::new(),
                orders: Vec::new(),
                warnings: Vec::new(),
                outcome: RunOutcome::Failed {
                    error,
                    failed_at: None,
                    phase: None,
                },
                final_state: PortfolioState::new(config.initial_capital),
                steps_recorded: 0,
                steps_skipped: 0,
            }
        }
    }
}
