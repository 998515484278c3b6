//! AllocLab Runner — batch orchestration on top of `alloclab-core`.
//!
//! - TOML run configs (engine settings, strategy choice, synthetic feed)
//! - Seeded random-walk feeds
//! - Parallel or sequential batches over a shared feed
//! - Parameter sweeps over drift, sizing policy and execution algorithm
//! - BLAKE3 fingerprints of configs, datasets and run outputs

pub mod batch;
pub mod config;
pub mod fingerprint;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use batch::{BatchJob, BatchResults, BatchRunner};
pub use config::{RunConfig, StrategyConfig};
pub use fingerprint::{config_hash, dataset_hash, result_digest, RunId};
pub use runner::{load_and_run, run_single, run_with_feed, RunError, RunReport};
pub use sweep::{ParamGrid, ParamSweep};
pub use synthetic::{generate_bars, SyntheticFeedConfig};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn batch_inputs_are_send_sync() {
        assert_send::<BatchJob>();
        assert_sync::<BatchJob>();
        assert_send::<BatchRunner>();
        assert_sync::<BatchRunner>();
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
    }

    #[test]
    fn reports_are_send() {
        assert_send::<RunReport>();
        assert_send::<RunError>();
    }
}
