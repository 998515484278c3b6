//! Moving-average crossover over a symbol universe.
//!
//! Long while the fast SMA of visible closes is above the slow SMA, exit
//! while it is below, hold on a tie or until enough history exists.

use std::collections::BTreeMap;

use super::{DecisionContext, Signal, SignalDirection, Strategy};
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct MovingAverageCross {
    symbols: Vec<String>,
    fast_period: usize,
    slow_period: usize,
}

impl MovingAverageCross {
    pub fn new(symbols: &[&str], fast_period: usize, slow_period: usize) -> Result<Self, EngineError> {
        if fast_period == 0 || slow_period <= fast_period {
            return Err(EngineError::InvalidConfig(format!(
                "moving average periods need 0 < fast < slow, got fast={fast_period} slow={slow_period}"
            )));
        }
        let mut symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        symbols.sort();
        symbols.dedup();
        Ok(Self {
            symbols,
            fast_period,
            slow_period,
        })
    }

    fn sma(closes: &[f64], period: usize) -> Option<f64> {
        if closes.len() < period {
            return None;
        }
        let recent = &closes[closes.len() - period..];
        Some(recent.iter().sum::<f64>() / period as f64)
    }

    fn direction(&self, closes: &[f64]) -> SignalDirection {
        match (
            Self::sma(closes, self.fast_period),
            Self::sma(closes, self.slow_period),
        ) {
            (Some(fast), Some(slow)) if fast > slow => SignalDirection::Long,
            (Some(fast), Some(slow)) if fast < slow => SignalDirection::Exit,
            _ => SignalDirection::Hold,
        }
    }
}

impl Strategy for MovingAverageCross {
    fn name(&self) -> &str {
        "ma_cross"
    }

    fn decide(&self, ctx: &DecisionContext<'_>) -> Option<Signal> {
        let directions: BTreeMap<String, SignalDirection> = self
            .symbols
            .iter()
            .map(|sym| (sym.clone(), self.direction(&ctx.history.closes(sym))))
            .collect();
        Some(Signal::Discrete(directions))
    }
}
