//! Run result models
//!
//! Per-case outcomes and the report for one full-suite run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::test_case::{TestCase, TestStatus};

/// Outcome of one case within a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: String,
    pub name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl CaseResult {
    fn new(case: &TestCase, status: TestStatus, duration_ms: u64, message: Option<String>) -> Self {
        Self {
            case_id: case.case_id.clone(),
            name: case.name.clone(),
            status,
            duration_ms,
            message,
            expected: None,
            actual: None,
        }
    }

    pub fn pass(case: &TestCase, duration_ms: u64) -> Self {
        Self::new(case, TestStatus::Passed, duration_ms, None)
    }

    pub fn fail(case: &TestCase, duration_ms: u64, message: impl Into<String>) -> Self {
        Self::new(case, TestStatus::Failed, duration_ms, Some(message.into()))
    }

    pub fn error(case: &TestCase, duration_ms: u64, message: impl Into<String>) -> Self {
        Self::new(case, TestStatus::Error, duration_ms, Some(message.into()))
    }

    pub fn skip(case: &TestCase, reason: impl Into<String>) -> Self {
        Self::new(case, TestStatus::Skipped, 0, Some(reason.into()))
    }

    pub fn with_payloads(mut self, expected: Option<Value>, actual: Option<Value>) -> Self {
        self.expected = expected;
        self.actual = actual;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

impl fmt::Display for CaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) [{}ms]",
            self.status.symbol(),
            self.name,
            self.case_id,
            self.duration_ms
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Failure detail kept in the run report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub case_id: String,
    pub name: String,
    pub status: TestStatus,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl From<&CaseResult> for FailureRecord {
    fn from(result: &CaseResult) -> Self {
        Self {
            case_id: result.case_id.clone(),
            name: result.name.clone(),
            status: result.status,
            error: result.message.clone().unwrap_or_default(),
            expected: result.expected.clone(),
            actual: result.actual.clone(),
        }
    }
}

/// Report for one full-suite run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub run: u32,
    pub suite: String,
    pub total: usize,
    pub passed: usize,
    /// FAILED and ERROR cases
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
    pub failures: Vec<FailureRecord>,
}

impl RunResult {
    /// Build the report from case results in execution order
    pub fn new(run: u32, suite: impl Into<String>, results: Vec<CaseResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.is_success()).count();
        let skipped = results
            .iter()
            .filter(|r| r.status == TestStatus::Skipped)
            .count();
        let failed = results
            .iter()
            .filter(|r| matches!(r.status, TestStatus::Failed | TestStatus::Error))
            .count();
        let duration_ms = results.iter().map(|r| r.duration_ms).sum();
        let failures = results
            .iter()
            .filter(|r| !r.is_success())
            .map(FailureRecord::from)
            .collect();

        Self {
            run,
            suite: suite.into(),
            total,
            passed,
            failed,
            skipped,
            duration_ms,
            results,
            failures,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    /// A run succeeds when every case passed
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn result(&self, case_id: &str) -> Option<&CaseResult> {
        self.results.iter().find(|r| r.case_id == case_id)
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} - {}", self.run, self.suite)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Skip: {}",
            self.total, self.passed, self.failed, self.skipped
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.duration_ms
        )
    }
}
