//! Test suite model
//!
//! A named set of cases plus the variable table used to fill `${name}`
//! placeholders. Suites are loaded from and saved to YAML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use super::test_case::{TestCase, TestStatus};
use crate::resolver;

/// Structural suite errors; these stop a run before any case executes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuiteError {
    #[error("Invalid suite configuration: {0}")]
    Config(String),

    #[error("Case '{case}' depends on '{missing}', which does not exist in the suite")]
    UnresolvedDependency { case: String, missing: String },

    #[error("Cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Duplicate case id: {0}")]
    DuplicateCase(String),

    #[error("Suite '{0}' has already been executed; run a fresh snapshot instead")]
    AlreadyExecuted(String),
}

/// On-disk suite layout
#[derive(Debug, Serialize, Deserialize)]
struct SuiteFile {
    #[serde(default = "default_suite_name")]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    variables: BTreeMap<String, Value>,
    test_cases: BTreeMap<String, TestCase>,
}

fn default_suite_name() -> String {
    "Default Suite".to_string()
}

/// Collection of test cases sharing one variable table
///
/// Cases are mutated in place while a run executes, so every run must own its
/// suite. Use [`TestSuite::snapshot`] to hand each run an independent copy of
/// an untouched template.
#[derive(Clone, Debug)]
pub struct TestSuite {
    pub name: String,
    pub description: String,
    pub cases: BTreeMap<String, TestCase>,
    pub variables: BTreeMap<String, Value>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            cases: BTreeMap::new(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_case(mut self, case: TestCase) -> Result<Self, SuiteError> {
        self.add_case(case)?;
        Ok(self)
    }

    /// Add a case; ids must be unique
    pub fn add_case(&mut self, case: TestCase) -> Result<(), SuiteError> {
        if case.case_id.is_empty() {
            return Err(SuiteError::Config(format!(
                "case '{}' has an empty id",
                case.name
            )));
        }
        if self.cases.contains_key(&case.case_id) {
            return Err(SuiteError::DuplicateCase(case.case_id));
        }
        self.cases.insert(case.case_id.clone(), case);
        Ok(())
    }

    /// Parse a suite from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self, SuiteError> {
        let file: SuiteFile = serde_yaml::from_str(content)
            .map_err(|e| SuiteError::Config(format!("failed to parse suite: {e}")))?;

        if file.test_cases.is_empty() {
            return Err(SuiteError::Config(format!(
                "suite '{}' defines no test cases",
                file.name
            )));
        }

        let cases = file
            .test_cases
            .into_iter()
            .map(|(id, mut case)| {
                case.case_id = id.clone();
                (id, case)
            })
            .collect();

        let suite = Self {
            name: file.name,
            description: file.description,
            cases,
            variables: file.variables,
        };
        suite.validate()?;

        Ok(suite)
    }

    /// Load a suite from a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite file: {}", path.display()))?;

        let suite = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to load suite: {}", path.display()))?;

        info!(
            "Loaded suite '{}' with {} cases from {}",
            suite.name,
            suite.cases.len(),
            path.display()
        );
        Ok(suite)
    }

    /// Write the suite back out in the layout `from_yaml` reads
    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = SuiteFile {
            name: self.name.clone(),
            description: self.description.clone(),
            variables: self.variables.clone(),
            test_cases: self.cases.clone(),
        };

        let content = serde_yaml::to_string(&file).context("Failed to serialize suite")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write suite file: {}", path.display()))?;

        debug!("Saved suite '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Check that every dependency names a case in this suite
    pub fn validate(&self) -> Result<(), SuiteError> {
        for (id, case) in &self.cases {
            if let Some(missing) = case
                .dependencies
                .iter()
                .find(|dep| !self.cases.contains_key(dep.as_str()))
            {
                return Err(SuiteError::UnresolvedDependency {
                    case: id.clone(),
                    missing: missing.clone(),
                });
            }
        }
        Ok(())
    }

    /// Dependency-respecting order in which the cases run
    pub fn execution_order(&self) -> Result<Vec<String>, SuiteError> {
        resolver::execution_order(&self.cases)
    }

    /// Replace `${name}` placeholders using this suite's variables
    pub fn resolve_variables(&self, text: &str) -> String {
        resolver::resolve(text, &self.variables)
    }

    /// Independent deep copy for one run
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// True while no case has left PENDING
    pub fn is_pristine(&self) -> bool {
        self.cases
            .values()
            .all(|case| case.status == TestStatus::Pending)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const SUITE_YAML: &str = r#"
name: User credit
description: Credit application flow
variables:
  base_url: http://localhost:8080
  channel: BN01
test_cases:
  apply:
    name: Credit apply
    method: POST
    api_path: ${base_url}/credit/apply
    headers:
      Content-Type: application/json
    body:
      channelCode: ${channel}
      data:
        userAuthInfo:
          idNo: ""
          name: Zhang San
    expected_response:
      code: "000000"
    expected_data:
      success: true
    dependencies: [check]
    setup: ignored legacy field
  check:
    name: Pre-check
    method: POST
    path: ${base_url}/credit/check
    expected_data:
      checkLoan: PASS
"#;

    #[test]
    fn test_from_yaml_str() {
        let suite = TestSuite::from_yaml_str(SUITE_YAML).unwrap();

        assert_eq!(suite.name, "User credit");
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.cases["apply"].case_id, "apply");
        assert_eq!(suite.cases["check"].api_path, "${base_url}/credit/check");
        assert_eq!(suite.cases["apply"].dependencies, vec!["check".to_string()]);
        assert_eq!(
            suite.cases["apply"].expected_data.as_ref().unwrap()["success"],
            json!(true)
        );
        assert_eq!(suite.variables["channel"], json!("BN01"));
    }

    #[test]
    fn test_body_key_order_preserved() {
        let suite = TestSuite::from_yaml_str(SUITE_YAML).unwrap();
        let body = suite.cases["apply"].body.as_ref().unwrap();
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["channelCode", "data"]);
    }

    #[test]
    fn test_unresolved_dependency_on_load() {
        let yaml = r#"
test_cases:
  b:
    name: B
    method: GET
    api_path: /b
    dependencies: [c]
"#;
        let err = TestSuite::from_yaml_str(yaml).unwrap_err();
        assert_eq!(
            err,
            SuiteError::UnresolvedDependency {
                case: "b".to_string(),
                missing: "c".to_string()
            }
        );
    }

    #[test]
    fn test_missing_test_cases_on_load() {
        let yaml = "name: typo\ntestcases:\n  a:\n    name: A\n    method: GET\n    api_path: /a\n";
        let err = TestSuite::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, SuiteError::Config(_)));
        assert!(err.to_string().contains("test_cases"));

        let err = TestSuite::from_yaml_str("name: empty\ntest_cases: {}\n").unwrap_err();
        assert!(err.to_string().contains("defines no test cases"));
    }

    #[test]
    fn test_invalid_method_on_load() {
        let yaml = "test_cases:\n  a:\n    name: A\n    method: CONNECT\n    api_path: /a\n";
        let err = TestSuite::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, SuiteError::Config(_)));
    }

    #[test]
    fn test_duplicate_case() {
        let case = TestCase::new("a", "A", "GET", "/a").unwrap();
        let mut suite = TestSuite::new("s", "").with_case(case.clone()).unwrap();
        assert_eq!(
            suite.add_case(case).unwrap_err(),
            SuiteError::DuplicateCase("a".to_string())
        );
    }

    #[test]
    fn test_snapshot_is_independent() {
        let template = TestSuite::from_yaml_str(SUITE_YAML).unwrap();
        let mut run = template.snapshot();

        run.cases.get_mut("apply").unwrap().body = Some(json!({"data": "sealed"}));
        run.cases
            .get_mut("check")
            .unwrap()
            .advance(TestStatus::Running);

        assert!(template.is_pristine());
        assert!(!run.is_pristine());
        assert_ne!(template.cases["apply"].body, run.cases["apply"].body);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("suites").join("credit.yaml");

        let suite = TestSuite::from_yaml_str(SUITE_YAML).unwrap();
        suite.save_yaml(&path).unwrap();

        let loaded = TestSuite::from_yaml(&path).unwrap();
        assert_eq!(loaded.name, suite.name);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.cases["apply"].body, suite.cases["apply"].body);
        assert_eq!(loaded.cases["apply"].dependencies, suite.cases["apply"].dependencies);
    }

    #[test]
    fn test_resolve_variables() {
        let suite = TestSuite::from_yaml_str(SUITE_YAML).unwrap();
        assert_eq!(
            suite.resolve_variables("${base_url}/x"),
            "http://localhost:8080/x"
        );
    }
}
