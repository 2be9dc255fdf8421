//! Data models for the API test harness
//!
//! Test cases, suites, and per-run results.

#![allow(dead_code)]

mod run_result;
mod suite;
mod test_case;

pub use run_result::{CaseResult, FailureRecord, RunResult};
pub use suite::{SuiteError, TestSuite};
pub use test_case::{HttpMethod, TestCase, TestStatus};
