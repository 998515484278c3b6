//! AllocLab Core — sizing, costs, order slicing, portfolio ledger, backtest loop.
//!
//! This crate turns target allocations into share-level trades and keeps the
//! books exact over long simulated histories:
//! - Sizing of dollar targets into shares under fractional or whole-share policy
//! - Commission and slippage models
//! - Immediate, TWAP, VWAP and Iceberg order slicing
//! - A self-reconciling portfolio ledger
//! - A step loop that drives a strategy through time without lookahead

pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod execution;
pub mod ledger;
pub mod sizing;
pub mod strategy;

pub use config::{ConfigError, DataGapPolicy, EngineConfig, ExecutionPricePolicy};
pub use data::{InMemoryFeed, PriceProvider};
pub use engine::{run_backtest, BacktestResult, RunOutcome};
pub use error::{EngineError, ErrorKind};
pub use ledger::{MarketSnapshot, PortfolioLedger, RebalanceResult};
pub use sizing::{SizedQuantity, SizingEngine, SizingPolicy};
pub use strategy::{Signal, SignalDirection, Strategy, TargetWeights};
