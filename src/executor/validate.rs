//! Response checks
//!
//! Checks run in a fixed order and stop at the first failure: HTTP status,
//! envelope shape, business code, signature, decryption, expected payload.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::RequiredKeys;
use crate::crypto::{decrypt_with_private_key, verify_with_public_key};
use crate::http::{HttpError, HttpResponse};
use crate::models::{TestCase, TestStatus};
use crate::resolver::plain_text;

const CODE_FIELD: &str = "code";
const DATA_FIELD: &str = "data";
const SIGN_FIELD: &str = "sign";
const ENVELOPE_FIELDS: [&str; 3] = [CODE_FIELD, DATA_FIELD, SIGN_FIELD];
const MESSAGE_FIELDS: [&str; 3] = ["msg", "message", "error"];

/// Why a case did not pass; recorded in the run report, never raised
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseFailure {
    #[error("Transport error: {0}")]
    Transport(#[from] HttpError),

    #[error("HTTP status mismatch: expected {expected}, got {actual}")]
    StatusMismatch { expected: u16, actual: u16 },

    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Business code mismatch: expected {expected}, got {actual}{}", message_suffix(.message))]
    BusinessCode {
        expected: String,
        actual: String,
        message: Option<String>,
    },

    #[error("Response signature verification failed")]
    SignatureInvalid,

    #[error("Failed to decrypt response payload: {0}")]
    Decrypt(String),

    #[error("Response payload mismatch: {reason}")]
    PayloadMismatch {
        reason: String,
        expected: Value,
        actual: Value,
    },

    #[error("Request preparation failed: {0}")]
    Preparation(String),

    #[error("Dependency '{0}' did not pass")]
    DependencyFailed(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_ref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default()
}

impl CaseFailure {
    /// Terminal status this failure leaves the case in
    pub fn status(&self) -> TestStatus {
        match self {
            CaseFailure::Transport(_) | CaseFailure::Preparation(_) => TestStatus::Error,
            CaseFailure::DependencyFailed(_) => TestStatus::Skipped,
            _ => TestStatus::Failed,
        }
    }

    pub fn expected(&self) -> Option<Value> {
        match self {
            CaseFailure::PayloadMismatch { expected, .. } => Some(expected.clone()),
            CaseFailure::StatusMismatch { expected, .. } => Some(Value::from(*expected)),
            CaseFailure::BusinessCode { expected, .. } => Some(Value::from(expected.as_str())),
            _ => None,
        }
    }

    pub fn actual(&self) -> Option<Value> {
        match self {
            CaseFailure::PayloadMismatch { actual, .. } => Some(actual.clone()),
            CaseFailure::StatusMismatch { actual, .. } => Some(Value::from(*actual)),
            CaseFailure::BusinessCode { actual, .. } => Some(Value::from(actual.as_str())),
            _ => None,
        }
    }
}

/// Check a response against `case`; returns the decrypted business payload
pub fn validate_response(
    case: &TestCase,
    response: &HttpResponse,
    keys: &RequiredKeys,
) -> Result<Value, CaseFailure> {
    if response.status_code != case.expected_status {
        return Err(CaseFailure::StatusMismatch {
            expected: case.expected_status,
            actual: response.status_code,
        });
    }

    let envelope = response
        .json()
        .map_err(|e| CaseFailure::MalformedEnvelope(format!("body is not JSON: {e}")))?;
    let Value::Object(envelope) = envelope else {
        return Err(CaseFailure::MalformedEnvelope(
            "body is not a JSON object".to_string(),
        ));
    };

    let missing: Vec<&str> = ENVELOPE_FIELDS
        .into_iter()
        .filter(|field| !envelope.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(CaseFailure::MalformedEnvelope(format!(
            "missing field(s): {}",
            missing.join(", ")
        )));
    }

    check_code(case, &envelope)?;

    let data = &envelope[DATA_FIELD];
    let signed_text = plain_text(data);
    let Some(signature) = envelope[SIGN_FIELD].as_str() else {
        return Err(CaseFailure::MalformedEnvelope(
            "'sign' is not a string".to_string(),
        ));
    };

    let verified = verify_with_public_key(&signed_text, &keys.platform_public_key, signature)
        .map_err(|e| CaseFailure::Preparation(e.to_string()))?;
    if !verified {
        return Err(CaseFailure::SignatureInvalid);
    }

    let payload = match data {
        Value::String(ciphertext) => {
            let plaintext = decrypt_with_private_key(ciphertext, &keys.channel_private_key)
                .map_err(|e| CaseFailure::Decrypt(e.to_string()))?;
            serde_json::from_str(&plaintext)
                .map_err(|e| CaseFailure::Decrypt(format!("payload is not JSON: {e}")))?
        }
        structured => structured.clone(),
    };

    if let Some(expected) = &case.expected_data {
        check_payload(expected, &payload)?;
    }

    Ok(payload)
}

fn check_code(case: &TestCase, envelope: &Map<String, Value>) -> Result<(), CaseFailure> {
    let expected = case.expected_response.code();
    let actual = plain_text(&envelope[CODE_FIELD]);
    if actual == expected {
        return Ok(());
    }

    let message = MESSAGE_FIELDS
        .iter()
        .find_map(|field| envelope.get(*field))
        .filter(|v| !v.is_null())
        .map(plain_text);

    Err(CaseFailure::BusinessCode {
        expected,
        actual,
        message,
    })
}

/// Every expected key must be present with an equal value
fn check_payload(expected: &Map<String, Value>, payload: &Value) -> Result<(), CaseFailure> {
    let mismatch = |reason: String| CaseFailure::PayloadMismatch {
        reason,
        expected: Value::Object(expected.clone()),
        actual: payload.clone(),
    };

    let Value::Object(actual) = payload else {
        if expected.is_empty() {
            return Ok(());
        }
        return Err(mismatch("payload is not a JSON object".to_string()));
    };

    let mut missing = Vec::new();
    let mut differing = Vec::new();
    for (key, want) in expected {
        match actual.get(key) {
            None => missing.push(key.as_str()),
            Some(got) if got != want => differing.push(key.as_str()),
            Some(_) => {}
        }
    }

    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing {}", missing.join(", ")));
    }
    if !differing.is_empty() {
        problems.push(format!("differs at {}", differing.join(", ")));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(mismatch(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt_with_public_key, sign_with_private_key, test_keys};
    use crate::http::mock::response;
    use serde_json::json;

    fn keys() -> RequiredKeys {
        RequiredKeys {
            channel_private_key: test_keys::channel().private_key.clone(),
            platform_public_key: test_keys::platform().public_key.clone(),
        }
    }

    /// Envelope as the platform would send it
    fn envelope(code: &str, payload: &Value) -> Value {
        let ciphertext =
            encrypt_with_public_key(&payload.to_string(), &test_keys::channel().public_key)
                .unwrap();
        let sign = sign_with_private_key(&ciphertext, &test_keys::platform().private_key).unwrap();
        json!({"code": code, "msg": "ok", "data": ciphertext, "sign": sign})
    }

    fn case() -> TestCase {
        let expected = json!({"success": true}).as_object().unwrap().clone();
        TestCase::new("a", "Apply", "POST", "/apply")
            .unwrap()
            .with_expected_data(expected)
    }

    #[test]
    fn test_valid_envelope() {
        let body = envelope("000000", &json!({"success": true, "creditNo": "C1"}));
        let payload = validate_response(&case(), &response(200, body.to_string()), &keys()).unwrap();
        assert_eq!(payload, json!({"success": true, "creditNo": "C1"}));
    }

    #[test]
    fn test_status_mismatch() {
        let err = validate_response(&case(), &response(500, "oops"), &keys()).unwrap_err();
        assert_eq!(
            err,
            CaseFailure::StatusMismatch {
                expected: 200,
                actual: 500
            }
        );
        assert_eq!(err.status(), TestStatus::Failed);
        assert_eq!(err.expected(), Some(json!(200)));
    }

    #[test]
    fn test_malformed_envelopes() {
        let not_json = validate_response(&case(), &response(200, "<html>"), &keys()).unwrap_err();
        assert!(matches!(not_json, CaseFailure::MalformedEnvelope(_)));

        let missing = validate_response(
            &case(),
            &response(200, r#"{"code":"000000","data":"x"}"#),
            &keys(),
        )
        .unwrap_err();
        assert_eq!(
            missing,
            CaseFailure::MalformedEnvelope("missing field(s): sign".to_string())
        );
    }

    #[test]
    fn test_business_code_carries_message() {
        let body = json!({"code": "100001", "message": "user frozen", "data": null, "sign": ""});
        let err = validate_response(&case(), &response(200, body.to_string()), &keys()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Business code mismatch: expected 000000, got 100001 (user frozen)"
        );
    }

    #[test]
    fn test_numeric_code_compares_as_string() {
        let mut body = envelope("0", &json!({"success": true}));
        body["code"] = json!(0);
        let case = case().with_expected_code("0");
        assert!(validate_response(&case, &response(200, body.to_string()), &keys()).is_ok());
    }

    #[test]
    fn test_tampered_signature() {
        let mut body = envelope("000000", &json!({"success": true}));
        let sign = body["sign"].as_str().unwrap().to_string();
        let flipped = if sign.starts_with('A') { "B" } else { "A" };
        body["sign"] = json!(format!("{flipped}{}", &sign[1..]));

        let err = validate_response(&case(), &response(200, body.to_string()), &keys()).unwrap_err();
        assert_eq!(err, CaseFailure::SignatureInvalid);
        assert_eq!(err.status(), TestStatus::Failed);
    }

    #[test]
    fn test_undecryptable_payload() {
        // signed correctly, but encrypted for the wrong key
        let ciphertext =
            encrypt_with_public_key("{}", &test_keys::platform().public_key).unwrap();
        let sign = sign_with_private_key(&ciphertext, &test_keys::platform().private_key).unwrap();
        let body = json!({"code": "000000", "data": ciphertext, "sign": sign});

        let err = validate_response(&case(), &response(200, body.to_string()), &keys()).unwrap_err();
        assert!(matches!(err, CaseFailure::Decrypt(_)));
    }

    #[test]
    fn test_structured_data_is_verified_as_json() {
        let data = json!({"success": true});
        let sign =
            sign_with_private_key(&data.to_string(), &test_keys::platform().private_key).unwrap();
        let body = json!({"code": "000000", "data": data, "sign": sign});

        let payload = validate_response(&case(), &response(200, body.to_string()), &keys()).unwrap();
        assert_eq!(payload, json!({"success": true}));
    }

    #[test]
    fn test_payload_mismatch_names_keys() {
        let expected = json!({"success": true, "creditNo": "C1", "reason": null})
            .as_object()
            .unwrap()
            .clone();
        let case = case().with_expected_data(expected);
        let body = envelope("000000", &json!({"success": false, "reason": "none"}));

        let err = validate_response(&case, &response(200, body.to_string()), &keys()).unwrap_err();
        match &err {
            CaseFailure::PayloadMismatch { reason, actual, .. } => {
                assert_eq!(reason, "missing creditNo; differs at success, reason");
                assert_eq!(actual, &json!({"success": false, "reason": "none"}));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_expected_null_requires_null() {
        let expected = json!({"reason": null}).as_object().unwrap().clone();
        assert!(check_payload(&expected, &json!({"reason": null})).is_ok());
        assert!(check_payload(&expected, &json!({"reason": ""})).is_err());
        assert!(check_payload(&expected, &json!({})).is_err());
    }

    #[test]
    fn test_failure_statuses() {
        assert_eq!(
            CaseFailure::Transport(HttpError::Timeout(3)).status(),
            TestStatus::Error
        );
        assert_eq!(
            CaseFailure::DependencyFailed("a".to_string()).status(),
            TestStatus::Skipped
        );
        assert_eq!(CaseFailure::SignatureInvalid.status(), TestStatus::Failed);
    }
}
