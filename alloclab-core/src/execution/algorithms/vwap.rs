//! VWAP: slices proportional to an expected volume profile.

use super::{distribute, MAX_SLICES};
use crate::domain::{ExecutionSlice, TimeWindow};
use crate::error::EngineError;
use crate::sizing::SizingPolicy;

const PROFILE_TOLERANCE: f64 = 1e-6;

pub(super) fn validate(profile: &[f64]) -> Result<(), EngineError> {
    if profile.is_empty() || profile.len() > MAX_SLICES {
        return Err(EngineError::OrderConstraint(format!(
            "VWAP profile must have 1..={MAX_SLICES} buckets, got {}",
            profile.len()
        )));
    }
    if profile.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(EngineError::OrderConstraint(
            "VWAP profile weights must be finite and non-negative".into(),
        ));
    }
    let sum: f64 = profile.iter().sum();
    if (sum - 1.0).abs() > PROFILE_TOLERANCE {
        return Err(EngineError::OrderConstraint(format!(
            "VWAP profile weights must sum to 1, got {sum}"
        )));
    }
    Ok(())
}

pub(super) fn slices(
    parent_qty: f64,
    profile: &[f64],
    policy: SizingPolicy,
    window: &TimeWindow,
) -> Vec<ExecutionSlice> {
    // Renormalize so the tolerance band never pushes a slot past the parent.
    let sum: f64 = profile.iter().sum();
    let weights: Vec<f64> = profile.iter().map(|w| w / sum).collect();
    let raw: Vec<f64> = weights.iter().map(|w| parent_qty * w).collect();
    distribute(parent_qty, &raw, &weights, policy, window)
}

#[cfg(test)]
mod tests {
    use super::super::{generate_slices, ExecutionAlgorithm};
    use super::*;
    use chrono::NaiveDate;

    fn run(parent: f64, profile: Vec<f64>, policy: SizingPolicy) -> Result<Vec<f64>, EngineError> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let slices = generate_slices(
            parent,
            &ExecutionAlgorithm::Vwap {
                volume_profile: profile,
            },
            policy,
            &TimeWindow::new(start, 390),
        )?;
        Ok(slices.iter().map(|s| s.quantity).collect())
    }

    #[test]
    fn proportional_to_profile() {
        let q = run(1_000.0, vec![0.5, 0.3, 0.2], SizingPolicy::Whole).unwrap();
        assert_eq!(q, vec![500.0, 300.0, 200.0]);
    }

    #[test]
    fn whole_remainder_on_last_bucket() {
        // 101 * [0.3, 0.3, 0.4] = [30.3, 30.3, 40.4] → [30, 30, 41]
        let q = run(101.0, vec![0.3, 0.3, 0.4], SizingPolicy::Whole).unwrap();
        assert_eq!(q, vec![30.0, 30.0, 41.0]);
    }

    #[test]
    fn u_shaped_profile_sums_exactly() {
        let profile = vec![0.2, 0.1, 0.05, 0.05, 0.1, 0.5];
        let q = run(777.0, profile, SizingPolicy::Whole).unwrap();
        assert_eq!(q.iter().sum::<f64>(), 777.0);
    }

    #[test]
    fn profile_must_sum_to_one() {
        assert!(matches!(
            run(100.0, vec![0.5, 0.4], SizingPolicy::Whole),
            Err(EngineError::OrderConstraint(_))
        ));
    }

    #[test]
    fn negative_or_empty_profile_rejected() {
        assert!(validate(&[]).is_err());
        assert!(validate(&[1.5, -0.5]).is_err());
        assert!(validate(&[f64::NAN]).is_err());
    }
}
