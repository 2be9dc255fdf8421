//! Concurrent repeated runs
//!
//! N full-suite runs across a bounded worker pool. Every run gets its own
//! snapshot of the suite template and its own transport; results are
//! collected as runs complete.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::runner::{RunOptions, SuiteRunner};
use crate::config::RequiredKeys;
use crate::fixtures::IdNumberGenerator;
use crate::http::{HttpError, Transport};
use crate::models::{FailureRecord, RunResult, SuiteError, TestSuite};
use crate::utils::Timer;

/// Builds a fresh transport for each run
pub type TransportFactory =
    Arc<dyn Fn() -> Result<Arc<dyn Transport>, HttpError> + Send + Sync>;

/// Repeats a suite concurrently
pub struct ConcurrentRunner {
    factory: TransportFactory,
    keys: RequiredKeys,
    repeat_times: u32,
    max_workers: usize,
    options: RunOptions,
    seed: Option<u64>,
}

impl ConcurrentRunner {
    pub fn new(factory: TransportFactory, keys: RequiredKeys) -> Self {
        Self {
            factory,
            keys,
            repeat_times: 10,
            max_workers: 5,
            options: RunOptions::default(),
            seed: None,
        }
    }

    pub fn repeat_times(mut self, runs: u32) -> Self {
        self.repeat_times = runs;
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Seed fixture generation; run `n` uses `seed + n`
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Run the suite `repeat_times` times
    ///
    /// Suite-level problems are reported before any run starts. A run that
    /// cannot complete is counted as a failed run.
    pub async fn run(&self, template: &TestSuite) -> Result<AggregateReport, SuiteError> {
        if !template.is_pristine() {
            return Err(SuiteError::AlreadyExecuted(template.name.clone()));
        }
        template.execution_order()?;

        info!(
            "Running suite '{}' {} times with {} workers",
            template.name, self.repeat_times, self.max_workers
        );

        let timer = Timer::start("concurrent runs");
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut pending = FuturesUnordered::new();

        for run in 1..=self.repeat_times {
            let semaphore = semaphore.clone();
            let factory = self.factory.clone();
            let keys = self.keys.clone();
            let options = self.options;
            let ids = match self.seed {
                Some(seed) => IdNumberGenerator::seeded(seed.wrapping_add(u64::from(run))),
                None => IdNumberGenerator::from_os_rng(),
            };
            let mut suite = template.snapshot();

            pending.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| format!("run {run}: {e}"))?;

                let transport = factory().map_err(|e| format!("run {run}: {e}"))?;
                let mut runner = SuiteRunner::new(transport.clone(), keys)
                    .with_options(options)
                    .with_id_generator(ids);

                let result = runner.run(&mut suite, run).await;
                transport.close();
                result.map_err(|e| format!("run {run}: {e}"))
            }));
        }

        let mut report = AggregateReport::new(template.name.clone());

        while let Some(joined) = pending.next().await {
            match joined {
                Ok(Ok(result)) => {
                    info!(
                        "Run {} finished: {}/{} passed",
                        result.run, result.passed, result.total
                    );
                    report.record(result);
                }
                Ok(Err(e)) => {
                    error!("Run failed: {}", e);
                    report.record_error(e);
                }
                Err(e) => {
                    error!("Run task aborted: {}", e);
                    report.record_error(e.to_string());
                }
            }
        }

        report.runs.sort_by_key(|r| r.run);
        report.duration_ms = timer.elapsed_ms();

        info!(
            "Concurrent execution completed in {}ms - Successful runs: {}/{} ({:.1}%)",
            report.duration_ms,
            report.successful_runs,
            report.total_runs,
            report.success_ratio() * 100.0
        );

        Ok(report)
    }
}

/// Run-level and case-level counts over all runs
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AggregateReport {
    pub suite: String,
    pub total_runs: usize,
    /// Runs where every case passed
    pub successful_runs: usize,
    pub failed_runs: usize,
    /// Runs that could not complete at all
    pub run_errors: Vec<String>,
    pub total_cases: usize,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub skipped_cases: usize,
    /// Failure details of every failed run, in completion order
    pub failure_details: Vec<FailureRecord>,
    pub duration_ms: u64,
    pub runs: Vec<RunResult>,
}

impl AggregateReport {
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            ..Default::default()
        }
    }

    /// Fold in one completed run
    pub fn record(&mut self, result: RunResult) {
        self.total_runs += 1;
        self.total_cases += result.total;
        self.passed_cases += result.passed;
        self.failed_cases += result.failed;
        self.skipped_cases += result.skipped;

        if result.is_success() {
            self.successful_runs += 1;
        } else {
            self.failed_runs += 1;
            self.failure_details.extend(result.failures.iter().cloned());
        }
        self.runs.push(result);
    }

    /// Count a run that never produced a result
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.total_runs += 1;
        self.failed_runs += 1;
        self.run_errors.push(error.into());
    }

    /// Successful runs over all runs, 0..=1
    pub fn success_ratio(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.successful_runs as f64 / self.total_runs as f64
        }
    }

    /// Passed case executions over all case executions, in percent
    pub fn case_pass_rate(&self) -> f64 {
        if self.total_cases == 0 {
            0.0
        } else {
            (self.passed_cases as f64 / self.total_cases as f64) * 100.0
        }
    }

    /// Whether the run success ratio strictly exceeds `threshold`
    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.success_ratio() > threshold
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Concurrent Report - {}", self.suite)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Runs: {} | Successful: {} | Failed: {} | Success Rate: {:.2}%",
            self.total_runs,
            self.successful_runs,
            self.failed_runs,
            self.success_ratio() * 100.0
        )?;
        writeln!(
            f,
            "Cases: {} | Pass: {} | Fail: {} | Skip: {} | Pass Rate: {:.2}%",
            self.total_cases,
            self.passed_cases,
            self.failed_cases,
            self.skipped_cases,
            self.case_pass_rate()
        )?;
        for error in &self.run_errors {
            writeln!(f, "  ✗ {error}")?;
        }
        Ok(())
    }
}
