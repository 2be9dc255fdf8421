//! Output formatters for run reports
//!
//! Provides table, JSON and one-line summary output.

use serde::Serialize;

use crate::executor::AggregateReport;
use crate::models::{CaseResult, FailureRecord, RunResult, TestStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn json<T: Serialize>(&self, value: &T) -> String {
        if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.colorize {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn status_label(&self, status: TestStatus) -> String {
        let label = format!("{} {}", status.symbol(), status);
        match status {
            TestStatus::Passed => self.paint(&label, "32"),
            TestStatus::Failed | TestStatus::Error => self.paint(&label, "31"),
            TestStatus::Skipped => self.paint(&label, "33"),
            TestStatus::Pending | TestStatus::Running => label,
        }
    }

    fn rate(&self, rate: f64) -> String {
        let text = format!("{rate:5.1}%");
        if rate >= 90.0 {
            self.paint(&text, "32")
        } else if rate >= 50.0 {
            self.paint(&text, "33")
        } else {
            self.paint(&text, "31")
        }
    }

    /// Format a single case result
    pub fn format_case(&self, result: &CaseResult) -> String {
        match self.format {
            OutputFormat::Table => format!(
                "{:24} {:16} {} [{:>6}ms]",
                result.name,
                result.case_id,
                self.status_label(result.status),
                result.duration_ms
            ),
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(result),
            OutputFormat::Summary => result.to_string(),
        }
    }

    /// Format the report of one run
    pub fn format_run(&self, run: &RunResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_run_table(run),
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(run),
            OutputFormat::Summary => format!(
                "{} - Run {}: {}/{} passed ({:.1}%), {} failed, {} skipped in {}ms",
                run.suite,
                run.run,
                run.passed,
                run.total,
                run.pass_rate(),
                run.failed,
                run.skipped,
                run.duration_ms
            ),
        }
    }

    fn format_run_table(&self, run: &RunResult) -> String {
        let mut output = String::new();

        output.push_str("\n══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(" Run {} - {}\n", run.run, run.suite));
        output.push_str("══════════════════════════════════════════════════════════════\n");

        for result in &run.results {
            output.push_str(&format!(" {}\n", self.format_case(result)));
        }

        output.push_str("──────────────────────────────────────────────────────────────\n");

        let fail_str = if run.failed > 0 {
            self.paint(&run.failed.to_string(), "31")
        } else {
            run.failed.to_string()
        };
        output.push_str(&format!(
            " Total: {} | Pass: {} | Fail: {} | Skip: {}\n",
            run.total,
            self.paint(&run.passed.to_string(), "32"),
            fail_str,
            run.skipped
        ));
        output.push_str(&format!(
            " Pass Rate: {} | Duration: {}ms\n",
            self.rate(run.pass_rate()),
            run.duration_ms
        ));

        output.push_str(&self.format_failures(&run.failures));
        output
    }

    /// Format the report of a concurrent execution
    pub fn format_aggregate(&self, report: &AggregateReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_aggregate_table(report),
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(report),
            OutputFormat::Summary => format!(
                "{}: {}/{} runs successful ({:.2}%), cases {}/{} passed ({:.2}%) in {}ms",
                report.suite,
                report.successful_runs,
                report.total_runs,
                report.success_ratio() * 100.0,
                report.passed_cases,
                report.total_cases,
                report.case_pass_rate(),
                report.duration_ms
            ),
        }
    }

    fn format_aggregate_table(&self, report: &AggregateReport) -> String {
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Concurrent Results: {} ({} runs)\n",
            report.suite, report.total_runs
        ));
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        output.push_str(&format!(
            " Successful runs: {} | Failed runs: {} | Success rate: {}\n",
            report.successful_runs,
            report.failed_runs,
            self.rate(report.success_ratio() * 100.0)
        ));
        output.push_str(&format!(
            " Case executions: {} | Passed: {} | Failed: {} | Skipped: {} | Pass rate: {}\n",
            report.total_cases,
            report.passed_cases,
            report.failed_cases,
            report.skipped_cases,
            self.rate(report.case_pass_rate())
        ));
        output.push_str(&format!(" Duration: {}ms\n", report.duration_ms));

        output.push_str(" ───────────────────────────────────────────────────────────\n");
        for run in &report.runs {
            let bar_len = ((run.pass_rate() / 5.0) as usize).min(20);
            output.push_str(&format!(
                " Run {:3} {}{} {}\n",
                run.run,
                "█".repeat(bar_len),
                "░".repeat(20 - bar_len),
                self.rate(run.pass_rate())
            ));
        }

        if !report.run_errors.is_empty() {
            output.push_str("\n Runs that did not complete:\n");
            for error in &report.run_errors {
                output.push_str(&format!("   - {}\n", self.paint(error, "31")));
            }
        }

        output.push_str(&self.format_failures(&report.failure_details));
        output
    }

    fn format_failures(&self, failures: &[FailureRecord]) -> String {
        if failures.is_empty() {
            return String::new();
        }

        let mut output = String::from("\n Failed cases:\n");
        for failure in failures {
            output.push_str(&format!(
                "   {} {} ({})\n",
                self.status_label(failure.status),
                failure.name,
                failure.case_id
            ));
            output.push_str(&format!("     {}\n", failure.error));
            if let Some(expected) = &failure.expected {
                output.push_str(&format!("     expected: {expected}\n"));
            }
            if let Some(actual) = &failure.actual {
                output.push_str(&format!("     actual:   {actual}\n"));
            }
        }
        output
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestCase;
    use serde_json::json;

    fn sample_run() -> RunResult {
        let a = TestCase::new("a", "Pre-check", "POST", "/a").unwrap();
        let b = TestCase::new("b", "Apply", "POST", "/b").unwrap();
        RunResult::new(
            1,
            "credit",
            vec![
                CaseResult::pass(&a, 12),
                CaseResult::fail(&b, 30, "Response payload mismatch: differs at success")
                    .with_payloads(Some(json!({"success": true})), Some(json!({"success": false}))),
            ],
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(
            OutputFormat::from_str("json-pretty"),
            Some(OutputFormat::JsonPretty)
        );
        assert_eq!(OutputFormat::from_str("unknown"), None);
    }

    #[test]
    fn test_table_lists_failures() {
        let output = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_run(&sample_run());

        assert!(output.contains("Run 1 - credit"));
        assert!(output.contains("✓ PASSED"));
        assert!(output.contains("Total: 2 | Pass: 1 | Fail: 1 | Skip: 0"));
        assert!(output.contains("Failed cases:"));
        assert!(output.contains(r#"expected: {"success":true}"#));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_colorized_table() {
        let output = ResultFormatter::new(OutputFormat::Table).format_run(&sample_run());
        assert!(output.contains("\x1b[32m"));
        assert!(output.contains("\x1b[31m"));
    }

    #[test]
    fn test_json_run() {
        let output = ResultFormatter::new(OutputFormat::Json).format_run(&sample_run());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["passed"], 1);
        assert_eq!(value["failures"][0]["case_id"], "b");
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_summary_aggregate() {
        let mut report = AggregateReport::new("credit");
        report.record(sample_run());
        report.duration_ms = 42;

        let output = ResultFormatter::new(OutputFormat::Summary).format_aggregate(&report);
        assert_eq!(
            output,
            "credit: 0/1 runs successful (0.00%), cases 1/2 passed (50.00%) in 42ms"
        );
    }
}
