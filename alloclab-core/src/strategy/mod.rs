//! Strategies: the engine's source of target weights.
//!
//! A strategy sees only a [`DecisionContext`] and answers with a [`Signal`]:
//! target weights or discrete long/hold/exit directions. It never produces
//! share quantities; sizing is the ledger's job.

mod history;
mod ma_cross;
mod schedule;
mod static_weights;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use crate::domain::TargetWeights;
pub use history::{DecisionContext, HistoryView};
pub use ma_cross::MovingAverageCross;
pub use schedule::SignalSchedule;
pub use static_weights::StaticWeights;

/// Discrete trade direction: `-1` exit, `0` hold, `+1` long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalDirection {
    Exit,
    Hold,
    Long,
}

impl SignalDirection {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            -1 => Some(Self::Exit),
            0 => Some(Self::Hold),
            1 => Some(Self::Long),
            _ => None,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Self::Exit => -1,
            Self::Hold => 0,
            Self::Long => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Targets(TargetWeights),
    Discrete(BTreeMap<String, SignalDirection>),
}

/// Signal provider driven by the backtest loop.
///
/// `decide` returning `None` means "no signal at this step"; the loop then
/// applies its data-gap policy.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn decide(&self, ctx: &DecisionContext<'_>) -> Option<Signal>;
}

/// Turn a signal into target weights given the current weights.
///
/// Discrete signals: `Exit` drops the symbol to zero; `Hold` and symbols
/// without a signal keep their current weight; `Long` on a symbol already
/// held keeps it, and each new `Long` gets an equal share of the capacity
/// left over, capped at `max_position_weight`.
pub fn resolve_targets(
    signal: &Signal,
    current: &BTreeMap<String, f64>,
    max_position_weight: f64,
) -> TargetWeights {
    let directions = match signal {
        Signal::Targets(weights) => return weights.clone(),
        Signal::Discrete(directions) => directions,
    };

    let mut targets = TargetWeights::new();
    for (symbol, &weight) in current {
        match directions.get(symbol) {
            Some(SignalDirection::Exit) => {
                targets.insert(symbol.clone(), 0.0);
            }
            _ => {
                targets.insert(symbol.clone(), weight.max(0.0));
            }
        }
    }

    let entries: Vec<&String> = directions
        .iter()
        .filter(|(sym, dir)| **dir == SignalDirection::Long && !current.contains_key(*sym))
        .map(|(sym, _)| sym)
        .collect();
    if entries.is_empty() {
        return targets;
    }

    let kept: f64 = targets.values().sum();
    let capacity = (1.0 - kept).max(0.0);
    let share = (capacity / entries.len() as f64).min(max_position_weight);
    for symbol in entries {
        targets.insert(symbol.clone(), share);
    }
    targets
}

/// Held symbols a discrete signal leaves as they are: `Hold`, `Long` or no
/// direction at all. Their weights in [`resolve_targets`] only reserve
/// capacity; the ledger does not resize them. Target maps keep nothing.
pub fn kept_symbols(signal: &Signal, current: &BTreeMap<String, f64>) -> BTreeSet<String> {
    let Signal::Discrete(directions) = signal else {
        return BTreeSet::new();
    };
    current
        .keys()
        .filter(|symbol| directions.get(*symbol) != Some(&SignalDirection::Exit))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(s, w)| (s.to_string(), *w)).collect()
    }

    fn discrete(pairs: &[(&str, i8)]) -> Signal {
        Signal::Discrete(
            pairs
                .iter()
                .map(|(s, d)| (s.to_string(), SignalDirection::from_i8(*d).unwrap()))
                .collect(),
        )
    }

    #[test]
    fn targets_pass_through() {
        let w = weights(&[("A", 0.3), ("B", 0.7)]);
        assert_eq!(resolve_targets(&Signal::Targets(w.clone()), &BTreeMap::new(), 1.0), w);
    }

    #[test]
    fn new_longs_split_free_capacity() {
        let current = weights(&[("A", 0.4)]);
        let t = resolve_targets(&discrete(&[("B", 1), ("C", 1)]), &current, 1.0);
        assert_eq!(t["A"], 0.4);
        assert!((t["B"] - 0.3).abs() < 1e-12);
        assert!((t["C"] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn exits_free_capacity_for_entries() {
        let current = weights(&[("A", 0.5), ("B", 0.5)]);
        let t = resolve_targets(&discrete(&[("A", -1), ("C", 1)]), &current, 1.0);
        assert_eq!(t["A"], 0.0);
        assert_eq!(t["B"], 0.5);
        assert!((t["C"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn entry_share_is_capped() {
        let t = resolve_targets(&discrete(&[("A", 1)]), &BTreeMap::new(), 0.25);
        assert_eq!(t["A"], 0.25);
    }

    #[test]
    fn held_long_keeps_its_weight() {
        let current = weights(&[("A", 0.6)]);
        let t = resolve_targets(&discrete(&[("A", 1), ("B", 0)]), &current, 1.0);
        assert_eq!(t["A"], 0.6);
        assert!(!t.contains_key("B"));
    }

    #[test]
    fn discrete_signals_keep_everything_but_exits() {
        let current = weights(&[("A", 0.3), ("B", 0.3), ("C", 0.3)]);
        let kept = kept_symbols(&discrete(&[("A", 1), ("B", -1), ("D", 1)]), &current);
        assert_eq!(kept, BTreeSet::from(["A".to_string(), "C".to_string()]));
        let targets = Signal::Targets(weights(&[("A", 0.3)]));
        assert!(kept_symbols(&targets, &current).is_empty());
    }

    #[test]
    fn direction_codes() {
        assert_eq!(SignalDirection::from_i8(2), None);
        for d in [-1, 0, 1] {
            assert_eq!(SignalDirection::from_i8(d).unwrap().as_i8(), d);
        }
    }
}
