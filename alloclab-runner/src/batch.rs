//! Batch execution of independent runs over one shared feed.
//!
//! Runs share nothing mutable: the feed sits behind an `Arc` and every job
//! owns its engine config, so parallel and sequential batches return the
//! same reports in the same order.

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use alloclab_core::{EngineConfig, PriceProvider};

use crate::config::StrategyConfig;
use crate::runner::{run_with_feed, RunError, RunReport};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub name: String,
    pub engine: EngineConfig,
    pub strategy: StrategyConfig,
}

impl BatchJob {
    pub fn new(name: impl Into<String>, engine: EngineConfig, strategy: StrategyConfig) -> Self {
        Self {
            name: name.into(),
            engine,
            strategy,
        }
    }
}

pub struct BatchRunner {
    feed: Arc<dyn PriceProvider>,
    parallel: bool,
}

impl BatchRunner {
    pub fn new(feed: Arc<dyn PriceProvider>) -> Self {
        Self {
            feed,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn run_job(&self, job: &BatchJob) -> Result<RunReport, RunError> {
        let report = run_with_feed(&job.name, &job.engine, &job.strategy, self.feed.as_ref())?;
        tracing::info!(
            job = %job.name,
            completed = report.result.is_completed(),
            total_return = report.total_return(),
            "batch job finished"
        );
        Ok(report)
    }

    /// Runs every job. The first job that cannot be set up fails the batch;
    /// engine failures inside a run are carried in its report.
    pub fn run(&self, jobs: &[BatchJob]) -> Result<BatchResults, RunError> {
        tracing::info!(jobs = jobs.len(), parallel = self.parallel, "starting batch");

        let reports = if self.parallel {
            jobs.par_iter()
                .map(|job| self.run_job(job))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            jobs.iter()
                .map(|job| self.run_job(job))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(BatchResults::new(reports))
    }
}

/// Reports in job order, indexed by job name.
#[derive(Debug)]
pub struct BatchResults {
    reports: Vec<RunReport>,
    by_name: HashMap<String, usize>,
}

impl BatchResults {
    fn new(reports: Vec<RunReport>) -> Self {
        let by_name = reports
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Self { reports, by_name }
    }

    pub fn all(&self) -> &[RunReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RunReport> {
        self.by_name.get(name).map(|&i| &self.reports[i])
    }

    pub fn completed(&self) -> impl Iterator<Item = &RunReport> {
        self.reports.iter().filter(|r| r.result.is_completed())
    }

    /// Completed run with the highest total return. Ties go to the earlier job.
    pub fn best_by_return(&self) -> Option<&RunReport> {
        self.completed().fold(None, |best: Option<&RunReport>, r| match best {
            Some(b) if b.total_return() >= r.total_return() => Some(b),
            _ => Some(r),
        })
    }

    pub fn digests(&self) -> Vec<(&str, &str)> {
        self.reports
            .iter()
            .map(|r| (r.name.as_str(), r.digest.as_str()))
            .collect()
    }
}
