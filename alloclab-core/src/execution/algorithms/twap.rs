//! TWAP: equal slices spaced evenly across the window.

use super::{distribute, MAX_SLICES};
use crate::domain::{ExecutionSlice, TimeWindow};
use crate::error::EngineError;
use crate::sizing::SizingPolicy;

pub(super) fn validate(n_slices: usize) -> Result<(), EngineError> {
    if n_slices == 0 || n_slices > MAX_SLICES {
        return Err(EngineError::OrderConstraint(format!(
            "TWAP slice count must be in 1..={MAX_SLICES}, got {n_slices}"
        )));
    }
    Ok(())
}

pub(super) fn slices(
    parent_qty: f64,
    n_slices: usize,
    policy: SizingPolicy,
    window: &TimeWindow,
) -> Vec<ExecutionSlice> {
    let each = parent_qty / n_slices as f64;
    let raw = vec![each; n_slices];
    let weights = vec![1.0 / n_slices as f64; n_slices];
    distribute(parent_qty, &raw, &weights, policy, window)
}

#[cfg(test)]
mod tests {
    use super::super::{generate_slices, ExecutionAlgorithm};
    use super::*;
    use chrono::NaiveDate;

    fn window() -> TimeWindow {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        TimeWindow::new(start, 100)
    }

    fn quantities(parent: f64, n: usize, policy: SizingPolicy) -> Vec<f64> {
        generate_slices(parent, &ExecutionAlgorithm::Twap { n_slices: n }, policy, &window())
            .unwrap()
            .iter()
            .map(|s| s.quantity)
            .collect()
    }

    #[test]
    fn even_split() {
        assert_eq!(quantities(100.0, 5, SizingPolicy::Whole), vec![20.0; 5]);
    }

    #[test]
    fn remainder_goes_to_last_slice() {
        assert_eq!(
            quantities(103.0, 5, SizingPolicy::Whole),
            vec![20.0, 20.0, 20.0, 20.0, 23.0]
        );
    }

    #[test]
    fn fewer_shares_than_slices() {
        let q = quantities(3.0, 5, SizingPolicy::Whole);
        assert_eq!(q, vec![0.0, 0.0, 0.0, 0.0, 3.0]);
        assert_eq!(q.iter().sum::<f64>(), 3.0);
    }

    #[test]
    fn fractional_slices_are_equal() {
        let q = quantities(10.0, 4, SizingPolicy::Fractional);
        for x in &q {
            assert!((x - 2.5).abs() < 1e-12);
        }
    }

    #[test]
    fn slices_span_the_window() {
        let slices = generate_slices(
            100.0,
            &ExecutionAlgorithm::Twap { n_slices: 4 },
            SizingPolicy::Whole,
            &window(),
        )
        .unwrap();
        assert_eq!(slices[0].scheduled_at, window().start);
        assert_eq!(
            slices[3].scheduled_at,
            window().start + chrono::Duration::minutes(75)
        );
        assert!((slices[0].weight - 0.25).abs() < 1e-12);
    }

    #[test]
    fn zero_slices_rejected() {
        assert!(validate(0).is_err());
        assert!(validate(MAX_SLICES + 1).is_err());
        assert!(validate(1).is_ok());
    }
}
