//! Parameter sweeps over engine settings.

use alloclab_core::execution::ExecutionAlgorithm;
use alloclab_core::{EngineConfig, SizingPolicy};

use crate::batch::{BatchJob, BatchResults, BatchRunner};
use crate::config::StrategyConfig;
use crate::runner::RunError;

/// Parameter grid specification.
///
/// Every combination of drift threshold, sizing policy and execution
/// algorithm is applied on top of a base config.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub drift_thresholds: Vec<f64>,
    pub sizing_policies: Vec<SizingPolicy>,
    pub algorithms: Vec<ExecutionAlgorithm>,
}

impl Default for ParamGrid {
    /// Drift 0%, 1%, 5%; both sizing policies; immediate and 5-slice TWAP.
    fn default() -> Self {
        Self {
            drift_thresholds: vec![0.0, 0.01, 0.05],
            sizing_policies: vec![SizingPolicy::Fractional, SizingPolicy::Whole],
            algorithms: vec![
                ExecutionAlgorithm::Immediate,
                ExecutionAlgorithm::Twap { n_slices: 5 },
            ],
        }
    }
}

impl ParamGrid {
    /// Upper bound on configs; combinations that fail validation are dropped.
    pub fn size(&self) -> usize {
        self.drift_thresholds.len() * self.sizing_policies.len() * self.algorithms.len()
    }

    pub fn generate_configs(&self, base: &EngineConfig) -> Vec<EngineConfig> {
        let mut configs = Vec::with_capacity(self.size());

        for &drift in &self.drift_thresholds {
            for &policy in &self.sizing_policies {
                for algorithm in &self.algorithms {
                    let config = EngineConfig {
                        rebalance_drift_threshold: drift,
                        sizing_policy: policy,
                        execution_algorithm: algorithm.clone(),
                        ..base.clone()
                    };
                    // e.g. a fractional iceberg clip under whole shares
                    if let Err(e) = config.validate() {
                        tracing::debug!(error = %e, "skipping invalid sweep combination");
                        continue;
                    }
                    configs.push(config);
                }
            }
        }

        configs
    }

    /// One named job per valid combination.
    pub fn jobs(&self, base: &EngineConfig, strategy: &StrategyConfig) -> Vec<BatchJob> {
        self.generate_configs(base)
            .into_iter()
            .map(|config| {
                let name = format!(
                    "drift={}/{:?}/{}",
                    config.rebalance_drift_threshold,
                    config.sizing_policy,
                    config.execution_algorithm.name()
                );
                BatchJob::new(name, config, strategy.clone())
            })
            .collect()
    }
}

/// Runs a grid through a batch runner.
pub struct ParamSweep {
    batch: BatchRunner,
}

impl ParamSweep {
    pub fn new(batch: BatchRunner) -> Self {
        Self { batch }
    }

    pub fn sweep(
        &self,
        grid: &ParamGrid,
        base: &EngineConfig,
        strategy: &StrategyConfig,
    ) -> Result<BatchResults, RunError> {
        self.batch.run(&grid.jobs(base, strategy))
    }
}
