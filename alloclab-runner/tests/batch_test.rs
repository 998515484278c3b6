//! Batch, sweep and config-loading tests over synthetic feeds.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use chrono::NaiveDate;

use alloclab_core::execution::ExecutionAlgorithm;
use alloclab_core::{EngineConfig, SizingPolicy};
use alloclab_runner::{
    load_and_run, BatchJob, BatchRunner, ParamGrid, ParamSweep, RunConfig, StrategyConfig,
    SyntheticFeedConfig,
};

fn feed_config() -> SyntheticFeedConfig {
    SyntheticFeedConfig::new(
        &["AAA", "BBB", "CCC", "DDD"],
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
    )
    .with_seed(2023)
}

fn batch(parallel: bool) -> BatchRunner {
    let feed = feed_config().build().unwrap();
    BatchRunner::new(Arc::new(feed)).with_parallelism(parallel)
}

fn costly_base() -> EngineConfig {
    EngineConfig {
        commission_fixed: 1.0,
        commission_pct: 0.0005,
        max_slippage_bps: 25.0,
        ..EngineConfig::default()
    }
}

fn strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::EqualWeight,
        StrategyConfig::StaticWeights {
            weights: BTreeMap::from([("AAA".to_string(), 0.7), ("CCC".to_string(), 0.3)]),
        },
        StrategyConfig::MaCrossover {
            fast_period: 5,
            slow_period: 20,
            symbols: None,
        },
    ]
}

// ── 1. Parallel and sequential batches agree ──

#[test]
fn parallel_and_sequential_batches_are_identical() {
    let jobs: Vec<BatchJob> = strategies()
        .into_iter()
        .flat_map(|strategy| ParamGrid::default().jobs(&costly_base(), &strategy))
        .enumerate()
        .map(|(i, mut job)| {
            job.name = format!("{i}:{}", job.name);
            job
        })
        .collect();

    let parallel = batch(true).run(&jobs).unwrap();
    let sequential = batch(false).run(&jobs).unwrap();

    assert_eq!(parallel.len(), jobs.len());
    assert_eq!(parallel.digests(), sequential.digests());
    for report in parallel.all() {
        assert!(report.result.is_completed(), "{} failed", report.name);
    }
}

#[test]
fn batch_preserves_job_order_and_names() {
    let jobs = ParamGrid::default().jobs(&costly_base(), &StrategyConfig::EqualWeight);
    let results = batch(true).run(&jobs).unwrap();
    let names: Vec<&str> = results.all().iter().map(|r| r.name.as_str()).collect();
    let expected: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, expected);
    assert!(results.get(&jobs[0].name).is_some());
    assert!(results.get("no-such-job").is_none());
}

#[test]
fn bad_job_fails_the_batch() {
    let jobs = vec![
        BatchJob::new("ok", EngineConfig::default(), StrategyConfig::EqualWeight),
        BatchJob::new(
            "bad",
            EngineConfig::default(),
            StrategyConfig::MaCrossover {
                fast_period: 10,
                slow_period: 10,
                symbols: None,
            },
        ),
    ];
    assert!(batch(true).run(&jobs).is_err());
}

// ── 2. Sweeps ──

#[test]
fn sweep_runs_every_valid_combination() {
    let grid = ParamGrid {
        drift_thresholds: vec![0.0, 0.02],
        sizing_policies: vec![SizingPolicy::Fractional, SizingPolicy::Whole],
        algorithms: vec![
            ExecutionAlgorithm::Immediate,
            ExecutionAlgorithm::Iceberg { clip_size: 50.0 },
        ],
    };
    let sweep = ParamSweep::new(batch(true));
    let results = sweep
        .sweep(&grid, &costly_base(), &StrategyConfig::EqualWeight)
        .unwrap();

    assert_eq!(results.len(), grid.size());
    assert_eq!(results.completed().count(), grid.size());
    assert!(results.best_by_return().is_some());
}

#[test]
fn whole_share_runs_hold_integral_positions() {
    let grid = ParamGrid {
        drift_thresholds: vec![0.01],
        sizing_policies: vec![SizingPolicy::Whole],
        algorithms: vec![ExecutionAlgorithm::Twap { n_slices: 4 }],
    };
    let results = ParamSweep::new(batch(false))
        .sweep(&grid, &costly_base(), &StrategyConfig::EqualWeight)
        .unwrap();
    for report in results.all() {
        for fill in &report.result.fills {
            assert_eq!(fill.shares, fill.shares.round(), "{fill:?}");
        }
        for position in report.result.final_state.positions.values() {
            assert_eq!(position.shares, position.shares.round());
        }
    }
}

#[test]
fn higher_drift_threshold_trades_less() {
    let grid = ParamGrid {
        drift_thresholds: vec![0.0, 0.05],
        sizing_policies: vec![SizingPolicy::Fractional],
        algorithms: vec![ExecutionAlgorithm::Immediate],
    };
    let results = ParamSweep::new(batch(true))
        .sweep(&grid, &EngineConfig::default(), &StrategyConfig::EqualWeight)
        .unwrap();
    let tight = &results.all()[0].result;
    let loose = &results.all()[1].result;
    assert!(loose.fills.len() < tight.fills.len());
}

// ── 3. Loading run configs from disk ──

#[test]
fn load_and_run_from_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
name = "from-disk"

[engine]
initial_capital = 25000.0
sizing_policy = "WHOLE"
commission_fixed = 1.0

[engine.execution_algorithm]
type = "TWAP"
n_slices = 3

[strategy]
type = "STATIC_WEIGHTS"
weights = {{ AAA = 0.5, BBB = 0.25 }}

[feed]
symbols = ["AAA", "BBB"]
start = "2024-01-01"
end = "2024-03-29"
seed = 5
"#
    )
    .unwrap();

    let report = load_and_run(file.path()).unwrap();
    assert_eq!(report.name, "from-disk");
    assert!(report.result.is_completed());
    assert!(!report.result.fills.is_empty());

    let again = RunConfig::from_file(file.path()).unwrap();
    assert_eq!(again.engine.execution_algorithm, ExecutionAlgorithm::Twap { n_slices: 3 });
    assert_eq!(alloclab_runner::run_single(&again).unwrap().digest, report.digest);
}

#[test]
fn malformed_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "name = \n[strategy").unwrap();
    assert!(load_and_run(file.path()).is_err());
}

#[test]
fn gappy_feed_still_completes() {
    let feed = feed_config().with_gap_probability(0.05).build().unwrap();
    let results = BatchRunner::new(Arc::new(feed))
        .run(&[BatchJob::new(
            "gaps",
            EngineConfig::default(),
            StrategyConfig::EqualWeight,
        )])
        .unwrap();
    let report = &results.all()[0];
    assert!(report.result.is_completed());
    assert!(!report.result.warnings.is_empty());
}
