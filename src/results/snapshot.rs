//! Run snapshot
//!
//! A single YAML document describing the latest run, with optional CSV export
//! of its failure details.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

use crate::executor::AggregateReport;
use crate::models::{FailureRecord, RunResult};

/// Which kind of execution produced the snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Single,
    Concurrent,
}

/// Failure detail tagged with the run it came from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFailure {
    pub run: u32,
    #[serde(flatten)]
    pub record: FailureRecord,
}

/// Snapshot of the latest execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Unique run ID
    pub id: String,

    pub suite: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,

    /// Case executions across all runs
    pub total_cases: usize,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub skipped_cases: usize,

    pub duration_ms: u64,

    #[serde(default)]
    pub run_errors: Vec<String>,

    #[serde(default)]
    pub failures: Vec<SnapshotFailure>,

    pub tool_version: String,
}

impl RunSnapshot {
    /// Snapshot of a single run
    pub fn from_run(result: &RunResult, started_at: DateTime<Utc>) -> Self {
        let success = result.is_success();
        Self {
            id: generate_run_id(),
            suite: result.suite.clone(),
            mode: RunMode::Single,
            started_at,
            completed_at: Utc::now(),
            total_runs: 1,
            successful_runs: usize::from(success),
            failed_runs: usize::from(!success),
            total_cases: result.total,
            passed_cases: result.passed,
            failed_cases: result.failed,
            skipped_cases: result.skipped,
            duration_ms: result.duration_ms,
            run_errors: Vec::new(),
            failures: tagged_failures(std::slice::from_ref(result)),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Snapshot of a concurrent execution
    pub fn from_aggregate(report: &AggregateReport, started_at: DateTime<Utc>) -> Self {
        Self {
            id: generate_run_id(),
            suite: report.suite.clone(),
            mode: RunMode::Concurrent,
            started_at,
            completed_at: Utc::now(),
            total_runs: report.total_runs,
            successful_runs: report.successful_runs,
            failed_runs: report.failed_runs,
            total_cases: report.total_cases,
            passed_cases: report.passed_cases,
            failed_cases: report.failed_cases,
            skipped_cases: report.skipped_cases,
            duration_ms: report.duration_ms,
            run_errors: report.run_errors.clone(),
            failures: tagged_failures(&report.runs),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Write the snapshot as YAML, replacing any previous one
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create snapshot file: {}", path.display()))?;
        serde_yaml::to_writer(BufWriter::new(file), self).context("Failed to write snapshot")?;

        info!("Saved run snapshot to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open snapshot file: {}", path.display()))?;
        serde_yaml::from_reader(BufReader::new(file)).context("Failed to parse snapshot")
    }

    /// Export failure details as CSV
    pub fn export_failures_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

        writer.write_record([
            "run", "case_id", "name", "status", "error", "expected", "actual",
        ])?;

        for failure in &self.failures {
            let record = &failure.record;
            writer.write_record([
                failure.run.to_string(),
                record.case_id.clone(),
                record.name.clone(),
                record.status.to_string(),
                record.error.clone(),
                record
                    .expected
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                record
                    .actual
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            ])?;
        }
        writer.flush()?;

        info!("Exported {} failures to {}", self.failures.len(), path.display());
        Ok(())
    }

    pub fn success_ratio(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.successful_runs as f64 / self.total_runs as f64
        }
    }
}

fn tagged_failures(runs: &[RunResult]) -> Vec<SnapshotFailure> {
    runs.iter()
        .flat_map(|run| {
            run.failures.iter().map(move |record| SnapshotFailure {
                run: run.run,
                record: record.clone(),
            })
        })
        .collect()
}

/// Generate unique run ID
pub fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseResult, TestCase};
    use serde_json::json;

    fn failing_run(run: u32) -> RunResult {
        let a = TestCase::new("a", "Pre-check", "POST", "/a").unwrap();
        let b = TestCase::new("b", "Apply", "POST", "/b").unwrap();
        RunResult::new(
            run,
            "credit",
            vec![
                CaseResult::pass(&a, 5),
                CaseResult::fail(&b, 7, "Business code mismatch: expected 0000, got 9999")
                    .with_payloads(Some(json!("0000")), Some(json!("9999"))),
            ],
        )
    }

    fn passing_run(run: u32) -> RunResult {
        let a = TestCase::new("a", "Pre-check", "POST", "/a").unwrap();
        RunResult::new(run, "credit", vec![CaseResult::pass(&a, 5)])
    }

    #[test]
    fn test_generate_run_id() {
        let id = generate_run_id();
        assert_eq!(id.len(), "20240101_120000_0000".len());
        assert_eq!(id.as_bytes()[8], b'_');
    }

    #[test]
    fn test_snapshot_from_run() {
        let snapshot = RunSnapshot::from_run(&failing_run(1), Utc::now());

        assert_eq!(snapshot.mode, RunMode::Single);
        assert_eq!(snapshot.total_runs, 1);
        assert_eq!(snapshot.failed_runs, 1);
        assert_eq!(snapshot.total_cases, 2);
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].record.case_id, "b");
        assert_eq!(snapshot.success_ratio(), 0.0);
    }

    #[test]
    fn test_snapshot_from_aggregate() {
        let mut report = AggregateReport::new("credit");
        report.record(passing_run(1));
        report.record(failing_run(2));
        report.record_error("run 3: connection refused".to_string());

        let snapshot = RunSnapshot::from_aggregate(&report, Utc::now());

        assert_eq!(snapshot.mode, RunMode::Concurrent);
        assert_eq!(snapshot.total_runs, 3);
        assert_eq!(snapshot.successful_runs, 1);
        assert_eq!(snapshot.failed_runs, 2);
        assert_eq!(snapshot.run_errors.len(), 1);
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].run, 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("latest.yaml");

        let snapshot = RunSnapshot::from_run(&failing_run(1), Utc::now());
        snapshot.save(&path).unwrap();

        let loaded = RunSnapshot::load(&path).unwrap();
        assert_eq!(loaded.id, snapshot.id);
        assert_eq!(loaded.suite, "credit");
        assert_eq!(loaded.failures.len(), 1);
        assert_eq!(loaded.failures[0].run, 1);
        assert_eq!(loaded.failures[0].record.case_id, "b");
        assert_eq!(loaded.completed_at, snapshot.completed_at);
    }

    #[test]
    fn test_export_failures_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.csv");

        let snapshot = RunSnapshot::from_run(&failing_run(4), Utc::now());
        snapshot.export_failures_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "4");
        assert_eq!(&rows[0][1], "b");
        assert_eq!(&rows[0][3], "FAILED");
        assert_eq!(&rows[0][5], "\"0000\"");
    }
}
