//! Backtest orchestration.
//!
//! Per decision timestamp the loop runs four phases:
//!
//! 1. Fetch signal: ask the strategy, seeing only bars before `t`
//! 2. Compute targets: resolve the signal into target weights
//! 3. Execute: build a market snapshot and rebalance through the ledger
//! 4. Record: mark at `t`'s close, reconcile, append an equity point
//!
//! A fatal error rolls the ledger back to the start of the failing step and
//! stops the run.

pub mod loop_runner;
pub mod state;

pub use loop_runner::{run_backtest, BacktestLoop};
pub use state::{
    BacktestResult, BacktestWarning, LoopState, RunOutcome, StepPhase, WarningKind,
};
