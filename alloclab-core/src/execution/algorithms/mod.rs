//! Order slicing algorithms.
//!
//! Every algorithm splits a parent quantity into time-ordered slices with
//! `Σ slice.quantity == parent_qty`. Per-slice rounding goes through
//! [`crate::sizing::round_shares`]; the final slice always takes
//! `parent − Σ previous`, so nothing is lost to rounding.

mod iceberg;
mod twap;
mod vwap;

use serde::{Deserialize, Serialize};

use crate::domain::{ExecutionSlice, TimeWindow};
use crate::error::EngineError;
use crate::sizing::{is_representable, round_shares, SizingPolicy};

/// Upper bound on slices per parent order.
pub const MAX_SLICES: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionAlgorithm {
    /// Single slice at the start of the window.
    #[default]
    Immediate,
    /// Equal slices spaced evenly across the window.
    Twap { n_slices: usize },
    /// Slices proportional to an expected volume profile (weights sum to 1).
    Vwap { volume_profile: Vec<f64> },
    /// Repeated visible clips of at most `clip_size` shares.
    Iceberg { clip_size: f64 },
}

impl ExecutionAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Twap { .. } => "twap",
            Self::Vwap { .. } => "vwap",
            Self::Iceberg { .. } => "iceberg",
        }
    }

    /// Check parameters independently of any parent quantity.
    pub fn validate(&self, policy: SizingPolicy) -> Result<(), EngineError> {
        match self {
            Self::Immediate => Ok(()),
            Self::Twap { n_slices } => twap::validate(*n_slices),
            Self::Vwap { volume_profile } => vwap::validate(volume_profile),
            Self::Iceberg { clip_size } => iceberg::validate(*clip_size, policy),
        }
    }
}

/// Split `parent_qty` into execution slices.
pub fn generate_slices(
    parent_qty: f64,
    algorithm: &ExecutionAlgorithm,
    policy: SizingPolicy,
    window: &TimeWindow,
) -> Result<Vec<ExecutionSlice>, EngineError> {
    if !parent_qty.is_finite() || parent_qty < 0.0 {
        return Err(EngineError::OrderConstraint(format!(
            "parent quantity must be finite and non-negative, got {parent_qty}"
        )));
    }
    if !is_representable(parent_qty, policy) {
        return Err(EngineError::OrderConstraint(format!(
            "parent quantity {parent_qty} is not a whole number of shares"
        )));
    }
    algorithm.validate(policy)?;
    if parent_qty == 0.0 {
        return Ok(Vec::new());
    }

    let slices = match algorithm {
        ExecutionAlgorithm::Immediate => vec![ExecutionSlice {
            index: 0,
            quantity: parent_qty,
            scheduled_at: window.start,
            weight: 1.0,
        }],
        ExecutionAlgorithm::Twap { n_slices } => twap::slices(parent_qty, *n_slices, policy, window),
        ExecutionAlgorithm::Vwap { volume_profile } => {
            vwap::slices(parent_qty, volume_profile, policy, window)
        }
        ExecutionAlgorithm::Iceberg { clip_size } => {
            iceberg::check_bound(parent_qty, *clip_size)?;
            iceberg::slices(parent_qty, *clip_size, window)
        }
    };
    Ok(slices)
}

/// Shared remainder rule: slots `0..n-1` take their rounded raw share, the
/// last slot takes whatever is left of the parent.
fn distribute(
    parent_qty: f64,
    raw: &[f64],
    weights: &[f64],
    policy: SizingPolicy,
    window: &TimeWindow,
) -> Vec<ExecutionSlice> {
    let n = raw.len();
    let mut allocated = 0.0;
    let mut slices = Vec::with_capacity(n);

    for (i, (&raw_qty, &weight)) in raw.iter().zip(weights).enumerate() {
        let quantity = if i + 1 == n {
            parent_qty - allocated
        } else {
            let q = round_shares(raw_qty, policy).min(parent_qty - allocated);
            allocated += q;
            q
        };
        slices.push(ExecutionSlice {
            index: i,
            quantity,
            scheduled_at: window.slot(i, n),
            weight,
        });
    }
    slices
}
