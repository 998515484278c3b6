use super::{DecisionContext, Signal, Strategy, TargetWeights};

/// Rebalances to the same weights at every step.
#[derive(Debug, Clone)]
pub struct StaticWeights {
    weights: TargetWeights,
}

impl StaticWeights {
    pub fn new(weights: TargetWeights) -> Self {
        Self { weights }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self::new(pairs.into_iter().map(|(s, w)| (s.to_string(), w)).collect())
    }

    /// Equal weight across `symbols`, fully invested.
    pub fn equal_weight(symbols: &[&str]) -> Self {
        let w = if symbols.is_empty() {
            0.0
        } else {
            1.0 / symbols.len() as f64
        };
        Self::from_pairs(symbols.iter().map(|s| (*s, w)))
    }

    pub fn weights(&self) -> &TargetWeights {
        &self.weights
    }
}

impl Strategy for StaticWeights {
    fn name(&self) -> &str {
        "static_weights"
    }

    fn decide(&self, _ctx: &DecisionContext<'_>) -> Option<Signal> {
        Some(Signal::Targets(self.weights.clone()))
    }
}
