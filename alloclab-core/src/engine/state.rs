//! Loop state machine and run result types.

use serde::{Deserialize, Serialize};

use crate::domain::{EquityPoint, FillRecord, PortfolioState, Timestamp};
use crate::error::EngineError;
use crate::ledger::OrderOutcome;

/// `Initialized → Running → Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    Initialized,
    Running { step: usize },
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepPhase {
    FetchSignal,
    ComputeTargets,
    Execute,
    Record,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Failed {
        error: EngineError,
        /// Decision timestamp of the failing step; `None` if the run never started.
        failed_at: Option<Timestamp>,
        phase: Option<StepPhase>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    DataGap,
    MissingSignal,
    StepSkipped,
    OrderRejected,
    /// Trade sized to zero shares (dust rule or under one whole share).
    OrderSkipped,
    /// Buy shrunk to the cash available.
    OrderClipped,
    RebalanceRejected,
    /// Gap rate for a symbol over the whole run exceeded the quality threshold.
    DataQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestWarning {
    pub timestamp: Option<Timestamp>,
    pub symbol: Option<String>,
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<FillRecord>,
    pub orders: Vec<OrderOutcome>,
    pub warnings: Vec<BacktestWarning>,
    pub outcome: RunOutcome,
    pub final_state: PortfolioState,
    /// Steps that produced an equity point.
    pub steps_recorded: usize,
    /// Steps dropped by the `Skip` data-gap policy.
    pub steps_skipped: usize,
}

impl BacktestResult {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    pub fn error(&self) -> Option<&EngineError> {
        match &self.outcome {
            RunOutcome::Completed => None,
            RunOutcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.final_state.initial_capital, |p| p.total_value)
    }

    pub fn total_return(&self) -> f64 {
        let initial = self.final_state.initial_capital;
        if initial <= 0.0 {
            return 0.0;
        }
        self.final_equity() / initial - 1.0
    }

    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &BacktestWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}
