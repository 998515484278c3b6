//! Single-run execution: build feed and strategy, run, fingerprint.

use anyhow::Context;
use std::path::{Path, PathBuf};
use thiserror::Error;

use alloclab_core::domain::BarError;
use alloclab_core::{run_backtest, BacktestResult, ConfigError, EngineConfig, EngineError, PriceProvider};

use crate::config::{RunConfig, StrategyConfig};
use crate::fingerprint::{config_hash, dataset_hash, result_digest, RunId};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse run config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build strategy: {0}")]
    Strategy(#[from] EngineError),

    #[error("bad feed data: {0}")]
    Data(#[from] BarError),

    #[error("failed to fingerprint run: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Output of one run plus the hashes that identify it.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub name: String,
    pub strategy: &'static str,
    pub config_hash: RunId,
    pub dataset_hash: String,
    pub digest: String,
    pub result: BacktestResult,
}

impl RunReport {
    pub fn total_return(&self) -> f64 {
        self.result.total_return()
    }
}

/// Runs one strategy against an already-built feed.
pub fn run_with_feed(
    name: &str,
    engine: &EngineConfig,
    strategy: &StrategyConfig,
    feed: &dyn PriceProvider,
) -> Result<RunReport, RunError> {
    let config_hash = config_hash(engine)?;
    let built = strategy.build(&feed.symbols())?;

    let result = run_backtest(built.as_ref(), feed, engine);
    let digest = result_digest(&result);
    tracing::debug!(
        run = name,
        config = %config_hash,
        completed = result.is_completed(),
        fills = result.fills.len(),
        "run finished"
    );

    Ok(RunReport {
        name: name.to_string(),
        strategy: strategy.name(),
        config_hash,
        dataset_hash: dataset_hash(feed),
        digest,
        result,
    })
}

/// Builds the synthetic feed described by `config` and runs it.
pub fn run_single(config: &RunConfig) -> Result<RunReport, RunError> {
    let feed = config.feed.build()?;
    run_with_feed(&config.name, &config.engine, &config.strategy, &feed)
}

/// Loads a TOML run config from disk and runs it.
pub fn load_and_run(path: impl AsRef<Path>) -> anyhow::Result<RunReport> {
    let path = path.as_ref();
    let config = RunConfig::from_file(path)
        .with_context(|| format!("loading run config {}", path.display()))?;
    let report = run_single(&config).with_context(|| format!("running '{}'", config.name))?;
    tracing::info!(
        run = %report.name,
        total_return = report.total_return(),
        "run complete"
    );
    Ok(report)
}
