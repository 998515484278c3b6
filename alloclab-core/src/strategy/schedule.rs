use std::collections::BTreeMap;

use super::{DecisionContext, Signal, Strategy};
use crate::domain::Timestamp;

/// Precomputed signals keyed by decision timestamp.
///
/// Steps without an entry yield no signal.
#[derive(Debug, Clone, Default)]
pub struct SignalSchedule {
    signals: BTreeMap<Timestamp, Signal>,
}

impl SignalSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, at: Timestamp, signal: Signal) -> &mut Self {
        self.signals.insert(at, signal);
        self
    }

    pub fn with(mut self, at: Timestamp, signal: Signal) -> Self {
        self.insert(at, signal);
        self
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl FromIterator<(Timestamp, Signal)> for SignalSchedule {
    fn from_iter<I: IntoIterator<Item = (Timestamp, Signal)>>(iter: I) -> Self {
        Self {
            signals: iter.into_iter().collect(),
        }
    }
}

impl Strategy for SignalSchedule {
    fn name(&self) -> &str {
        "signal_schedule"
    }

    fn decide(&self, ctx: &DecisionContext<'_>) -> Option<Signal> {
        self.signals.get(&ctx.timestamp).cloned()
    }
}
