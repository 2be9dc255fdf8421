//! Test case model
//!
//! One HTTP call against the KYC service with its expectations and
//! dependencies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::suite::SuiteError;
use crate::resolver::plain_text;

/// Business code the service returns on success
pub const SUCCESS_CODE: &str = "000000";

/// HTTP methods a case may use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Whether requests with this method carry a JSON body
    pub fn has_body(&self) -> bool {
        !matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl FromStr for HttpMethod {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            _ => Err(SuiteError::Config(format!("Unsupported HTTP method: {s}"))),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = SuiteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case execution status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    #[default]
    Pending,
    Running,
    Passed,
    Failed,
    Error,
    Skipped,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Pending => "·",
            TestStatus::Running => "…",
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Error => "!",
            TestStatus::Skipped => "○",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TestStatus::Passed | TestStatus::Failed | TestStatus::Error | TestStatus::Skipped
        )
    }

    /// PENDING → RUNNING → {PASSED | FAILED | ERROR}, or PENDING → SKIPPED.
    pub fn can_transition_to(&self, next: TestStatus) -> bool {
        matches!(
            (self, next),
            (TestStatus::Pending, TestStatus::Running)
                | (TestStatus::Pending, TestStatus::Skipped)
                | (
                    TestStatus::Running,
                    TestStatus::Passed | TestStatus::Failed | TestStatus::Error
                )
        )
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pending => write!(f, "PENDING"),
            TestStatus::Running => write!(f, "RUNNING"),
            TestStatus::Passed => write!(f, "PASSED"),
            TestStatus::Failed => write!(f, "FAILED"),
            TestStatus::Error => write!(f, "ERROR"),
            TestStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Expected response envelope fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpectedResponse {
    /// Business code, string-compared against the envelope's `code`
    #[serde(default = "default_code")]
    pub code: Value,

    /// Any other envelope fields declared in the suite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_code() -> Value {
    Value::String(SUCCESS_CODE.to_string())
}

impl Default for ExpectedResponse {
    fn default() -> Self {
        Self {
            code: default_code(),
            extra: Map::new(),
        }
    }
}

impl ExpectedResponse {
    pub fn code(&self) -> String {
        match &self.code {
            Value::Null => SUCCESS_CODE.to_string(),
            other => plain_text(other),
        }
    }
}

fn default_expected_status() -> u16 {
    200
}

/// A single API test case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique id, taken from the key under `test_cases`
    #[serde(skip)]
    pub case_id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub method: HttpMethod,

    /// Target path or URL, may contain `${var}` placeholders
    #[serde(alias = "path")]
    pub api_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    #[serde(default)]
    pub expected_response: ExpectedResponse,

    /// Fields the decrypted business payload must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_data: Option<Map<String, Value>>,

    /// Request timeout in seconds; the client-wide timeout applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(skip)]
    pub status: TestStatus,
}

impl TestCase {
    /// Create a case; fails on an unsupported method
    pub fn new(
        case_id: impl Into<String>,
        name: impl Into<String>,
        method: &str,
        api_path: impl Into<String>,
    ) -> Result<Self, SuiteError> {
        Ok(Self {
            case_id: case_id.into(),
            name: name.into(),
            description: String::new(),
            method: method.parse()?,
            api_path: api_path.into(),
            headers: None,
            params: None,
            body: None,
            expected_status: default_expected_status(),
            expected_response: ExpectedResponse::default(),
            expected_data: None,
            timeout: None,
            dependencies: Vec::new(),
            status: TestStatus::Pending,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn with_expected_code(mut self, code: impl Into<String>) -> Self {
        self.expected_response.code = Value::String(code.into());
        self
    }

    pub fn with_expected_data(mut self, expected: Map<String, Value>) -> Self {
        self.expected_data = Some(expected);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn depends_on(mut self, case_id: impl Into<String>) -> Self {
        self.dependencies.push(case_id.into());
        self
    }

    /// Move to `next` if the transition is allowed; returns whether it happened
    pub fn advance(&mut self, next: TestStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.case_id)
    }
}
