//! Serializable run configuration.
//!
//! A `RunConfig` captures everything needed to reproduce a run:
//! - Engine settings (sizing, costs, execution)
//! - Strategy choice and its parameters
//! - The synthetic feed the strategy is run against

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use alloclab_core::strategy::{MovingAverageCross, StaticWeights};
use alloclab_core::{EngineConfig, EngineError, Strategy};

use crate::fingerprint::{config_hash, RunId};
use crate::runner::RunError;
use crate::synthetic::SyntheticFeedConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: String,
    #[serde(default)]
    pub engine: EngineConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub feed: SyntheticFeedConfig,
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, RunError> {
        let config: RunConfig = toml::from_str(text)?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, RunError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Deterministic ID over the engine config and strategy choice.
    pub fn run_id(&self) -> Result<RunId, RunError> {
        let engine = config_hash(&self.engine)?;
        let strategy = serde_json::to_string(&self.strategy)?;
        let feed = serde_json::to_string(&self.feed)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(engine.as_bytes());
        hasher.update(strategy.as_bytes());
        hasher.update(feed.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Strategy selection (serializable enum).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    /// Fixed target weights, rebalanced every step.
    StaticWeights { weights: BTreeMap<String, f64> },

    /// Equal weight across the whole universe.
    EqualWeight,

    /// Long when the fast SMA is above the slow SMA, flat otherwise.
    MaCrossover {
        fast_period: usize,
        slow_period: usize,
        /// Defaults to the whole universe.
        #[serde(default)]
        symbols: Option<Vec<String>>,
    },
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StaticWeights { .. } => "static_weights",
            Self::EqualWeight => "equal_weight",
            Self::MaCrossover { .. } => "ma_crossover",
        }
    }

    /// Instantiate the strategy over `universe`.
    pub fn build(&self, universe: &[String]) -> Result<Box<dyn Strategy>, EngineError> {
        match self {
            Self::StaticWeights { weights } => Ok(Box::new(StaticWeights::new(weights.clone()))),
            Self::EqualWeight => {
                if universe.is_empty() {
                    return Err(EngineError::InvalidConfig(
                        "equal weight needs at least one symbol".into(),
                    ));
                }
                let symbols: Vec<&str> = universe.iter().map(String::as_str).collect();
                Ok(Box::new(StaticWeights::equal_weight(&symbols)))
            }
            Self::MaCrossover {
                fast_period,
                slow_period,
                symbols,
            } => {
                let symbols: Vec<&str> = symbols
                    .as_deref()
                    .unwrap_or(universe)
                    .iter()
                    .map(String::as_str)
                    .collect();
                let strategy = MovingAverageCross::new(&symbols, *fast_period, *slow_period)?;
                Ok(Box::new(strategy))
            }
        }
    }
}
