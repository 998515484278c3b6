//! Execution: transaction costs and parent-order slicing.
//!
//! Both halves are stateless: the cost model carries only configuration and
//! the slicing algorithms are pure generators. The ledger owns all mutable
//! state and applies the resulting fills.

pub mod algorithms;
pub mod cost_model;

pub use algorithms::{generate_slices, ExecutionAlgorithm, MAX_SLICES};
pub use cost_model::{Liquidity, SlippageModel, TradeCost, TransactionCostModel};
