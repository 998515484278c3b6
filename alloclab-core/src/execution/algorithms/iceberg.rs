//! Iceberg: expose `min(clip, remaining)` until the parent is exhausted.

use super::MAX_SLICES;
use crate::domain::{ExecutionSlice, TimeWindow};
use crate::error::EngineError;
use crate::sizing::{is_representable, SizingPolicy, SHARE_EPSILON};

pub(super) fn validate(clip_size: f64, policy: SizingPolicy) -> Result<(), EngineError> {
    if !clip_size.is_finite() || clip_size <= 0.0 {
        return Err(EngineError::OrderConstraint(format!(
            "iceberg clip size must be positive, got {clip_size}"
        )));
    }
    if !is_representable(clip_size, policy) {
        return Err(EngineError::OrderConstraint(format!(
            "iceberg clip size {clip_size} is not a whole number of shares"
        )));
    }
    Ok(())
}

/// Number of clips needed for `parent_qty`: `ceil(parent / clip)`, so no
/// slice exceeds the clip. A parent within rounding of a multiple gets no
/// empty tail.
pub(super) fn clip_count(parent_qty: f64, clip_size: f64) -> usize {
    let n = ((parent_qty / clip_size) - SHARE_EPSILON).ceil().max(1.0) as usize;
    if parent_qty - clip_size * (n - 1) as f64 > clip_size {
        n + 1
    } else {
        n
    }
}

pub(super) fn slices(parent_qty: f64, clip_size: f64, window: &TimeWindow) -> Vec<ExecutionSlice> {
    let n = clip_count(parent_qty, clip_size);
    (0..n)
        .map(|i| {
            let quantity = if i + 1 == n {
                parent_qty - clip_size * (n - 1) as f64
            } else {
                clip_size
            };
            ExecutionSlice {
                index: i,
                quantity,
                scheduled_at: window.slot(i, n),
                weight: quantity / parent_qty,
            }
        })
        .collect()
}

/// Reject clip sizes that would exceed the slice bound for this parent.
pub(super) fn check_bound(parent_qty: f64, clip_size: f64) -> Result<(), EngineError> {
    if parent_qty / clip_size > MAX_SLICES as f64 {
        return Err(EngineError::OrderConstraint(format!(
            "iceberg clip {clip_size} would split {parent_qty} into more than {MAX_SLICES} slices"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{generate_slices, ExecutionAlgorithm};
    use super::*;
    use chrono::NaiveDate;

    fn run(parent: f64, clip: f64, policy: SizingPolicy) -> Result<Vec<f64>, EngineError> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let slices = generate_slices(
            parent,
            &ExecutionAlgorithm::Iceberg { clip_size: clip },
            policy,
            &TimeWindow::new(start, 60),
        )?;
        Ok(slices.iter().map(|s| s.quantity).collect())
    }

    #[test]
    fn clips_until_exhausted() {
        assert_eq!(
            run(250.0, 100.0, SizingPolicy::Whole).unwrap(),
            vec![100.0, 100.0, 50.0]
        );
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        assert_eq!(run(200.0, 100.0, SizingPolicy::Whole).unwrap(), vec![100.0, 100.0]);
    }

    #[test]
    fn clip_larger_than_parent() {
        assert_eq!(run(30.0, 100.0, SizingPolicy::Whole).unwrap(), vec![30.0]);
    }

    #[test]
    fn fractional_clips() {
        let q = run(2.5, 1.0, SizingPolicy::Fractional).unwrap();
        assert_eq!(q.len(), 3);
        assert!((q[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn last_slice_never_exceeds_the_clip() {
        let parent = 3.000_000_000_1;
        let q = run(parent, 1.0, SizingPolicy::Fractional).unwrap();
        assert_eq!(q.len(), 4);
        assert!(q.iter().all(|&x| x > 0.0 && x <= 1.0), "{q:?}");
        assert!((q.iter().sum::<f64>() - parent).abs() < 1e-12);
    }

    #[test]
    fn invalid_clips_rejected() {
        for clip in [0.0, -5.0, f64::NAN] {
            assert!(matches!(
                run(100.0, clip, SizingPolicy::Fractional),
                Err(EngineError::OrderConstraint(_))
            ));
        }
        assert!(matches!(
            run(100.0, 2.5, SizingPolicy::Whole),
            Err(EngineError::OrderConstraint(_))
        ));
    }

    #[test]
    fn slice_count_is_bounded() {
        assert!(matches!(
            run(1_000_000.0, 1.0, SizingPolicy::Whole),
            Err(EngineError::OrderConstraint(_))
        ));
        assert_eq!(clip_count(250.0, 100.0), 3);
    }
}
