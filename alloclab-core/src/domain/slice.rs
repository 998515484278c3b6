use serde::{Deserialize, Serialize};

use super::Timestamp;

/// One child of a parent order, produced by an execution algorithm.
///
/// Slices are immutable once generated and consumed exactly once by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSlice {
    pub index: usize,
    pub quantity: f64,
    pub scheduled_at: Timestamp,
    /// Share of the parent quantity the algorithm assigned to this slice.
    pub weight: f64,
}
