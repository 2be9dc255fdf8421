//! Suite runner
//!
//! Executes one suite run: cases strictly in dependency order, one at a time.
//! A failing case never stops the run.

use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::prepare::prepare_request;
use super::validate::{validate_response, CaseFailure};
use crate::config::RequiredKeys;
use crate::fixtures::{Fixtures, IdNumberGenerator, RegionMode};
use crate::http::Transport;
use crate::models::{CaseResult, RunResult, SuiteError, TestCase, TestStatus, TestSuite};
use crate::utils::Timer;

/// Knobs shared by single and concurrent runs
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunOptions {
    /// Mark a case SKIPPED when one of its dependencies did not pass
    pub skip_on_dependency_failure: bool,
    pub region_mode: RegionMode,
}

/// Runs suites against one transport
pub struct SuiteRunner {
    transport: Arc<dyn Transport>,
    keys: RequiredKeys,
    options: RunOptions,
    ids: IdNumberGenerator,
}

impl SuiteRunner {
    pub fn new(transport: Arc<dyn Transport>, keys: RequiredKeys) -> Self {
        Self {
            transport,
            keys,
            options: RunOptions::default(),
            ids: IdNumberGenerator::from_os_rng(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self.ids = self.ids.with_mode(options.region_mode);
        self
    }

    /// Use a fixed fixture source, e.g. a seeded generator
    pub fn with_id_generator(mut self, ids: IdNumberGenerator) -> Self {
        self.ids = ids.with_mode(self.options.region_mode);
        self
    }

    /// Execute every case of `suite` once
    ///
    /// Structural problems (unknown dependency, cycle, reused suite) are
    /// returned before any case runs. Case bodies are sealed in place, so a
    /// suite can only be run once; run a [`TestSuite::snapshot`] of a template
    /// for repeated runs.
    pub async fn run(&mut self, suite: &mut TestSuite, run: u32) -> Result<RunResult, SuiteError> {
        if !suite.is_pristine() {
            return Err(SuiteError::AlreadyExecuted(suite.name.clone()));
        }
        let order = suite.execution_order()?;

        info!(
            "Run {}: suite '{}' with {} cases",
            run,
            suite.name,
            order.len()
        );
        debug!("Execution order: {}", order.join(" -> "));

        let timer = Timer::start(format!("run {run}"));
        let mut results = Vec::with_capacity(order.len());

        for case_id in &order {
            let blocked_by = if self.options.skip_on_dependency_failure {
                failed_dependency(&suite.cases, case_id)
            } else {
                None
            };
            let Some(case) = suite.cases.get_mut(case_id) else {
                continue;
            };

            let result = self.run_case(case, &suite.variables, blocked_by).await;
            info!("  {}", result);
            results.push(result);
        }

        let summary = RunResult::new(run, suite.name.clone(), results);

        info!(
            "Run {} completed in {}ms - Pass: {}/{} ({:.1}%)",
            run,
            timer.elapsed_ms(),
            summary.passed,
            summary.total,
            summary.pass_rate()
        );

        Ok(summary)
    }

    async fn run_case(
        &mut self,
        case: &mut TestCase,
        variables: &BTreeMap<String, Value>,
        blocked_by: Option<String>,
    ) -> CaseResult {
        if let Some(dependency) = blocked_by {
            case.advance(TestStatus::Skipped);
            let failure = CaseFailure::DependencyFailed(dependency);
            warn!("Skipping {}: {}", case, failure);
            return CaseResult::skip(case, failure.to_string());
        }

        case.advance(TestStatus::Running);
        let timer = Timer::start(format!("case {}", case.case_id));

        let fixtures = Fixtures::new(self.ids.generate());
        debug!("Fixture id number for {}: {}", case.case_id, fixtures.id_number);

        let outcome = match prepare_request(
            case,
            variables,
            &fixtures,
            &self.keys,
            Utc::now().timestamp_millis(),
        ) {
            Ok(request) => {
                if request.body.is_some() {
                    case.body = request.body.clone();
                }
                info!("Running {} [{} {}]", case, request.method, request.url);

                match self.transport.send(request).await {
                    Ok(response) => {
                        debug!(
                            "Response for {}: {} {}",
                            case.case_id, response.status_code, response.body
                        );
                        validate_response(case, &response, &self.keys)
                    }
                    Err(e) => Err(CaseFailure::from(e)),
                }
            }
            Err(failure) => Err(failure),
        };

        let duration_ms = timer.stop().as_millis() as u64;

        match outcome {
            Ok(_) => {
                case.advance(TestStatus::Passed);
                CaseResult::pass(case, duration_ms)
            }
            Err(failure) => {
                let status = failure.status();
                case.advance(status);
                error!("{} {}: {}", status, case, failure);

                let result = if status == TestStatus::Error {
                    CaseResult::error(case, duration_ms, failure.to_string())
                } else {
                    CaseResult::fail(case, duration_ms, failure.to_string())
                };
                result.with_payloads(failure.expected(), failure.actual())
            }
        }
    }
}

fn failed_dependency(
    cases: &BTreeMap<String, TestCase>,
    case_id: &str,
) -> Option<String> {
    cases
        .get(case_id)?
        .dependencies
        .iter()
        .find(|dep| {
            cases
                .get(dep.as_str())
                .map_or(true, |c| c.status != TestStatus::Passed)
        })
        .cloned()
}
