//! Per-case request preparation
//!
//! Resolves placeholders, injects fixtures and seals the body's `data`
//! object: encrypted with the platform public key, ciphertext signed with the
//! channel private key.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::validate::CaseFailure;
use crate::config::RequiredKeys;
use crate::crypto::{encrypt_with_public_key, sign_with_private_key, CryptoError};
use crate::fixtures::{inject_fixtures, Fixtures, DATA_FIELD};
use crate::http::HttpRequest;
use crate::models::TestCase;
use crate::resolver::{resolve, resolve_headers, resolve_value};

pub const SIGN_FIELD: &str = "sign";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Build the request for `case` without touching the case itself
pub fn prepare_request(
    case: &TestCase,
    variables: &BTreeMap<String, Value>,
    fixtures: &Fixtures,
    keys: &RequiredKeys,
    timestamp_ms: i64,
) -> Result<HttpRequest, CaseFailure> {
    let url = resolve(&case.api_path, variables);

    let mut headers = case.headers.clone().unwrap_or_default();
    resolve_headers(&mut headers, variables);

    let mut params = case.params.clone().unwrap_or_default();
    for value in params.values_mut() {
        resolve_value(value, variables);
    }

    let mut request = HttpRequest::new(case.method, url)
        .headers(headers)
        .params(params);
    if let Some(secs) = case.timeout {
        request = request.timeout(Duration::from_secs(secs));
    }

    if let Some(template) = &case.body {
        let mut body = template.clone();
        resolve_value(&mut body, variables);
        let mut body = inject_fixtures(&body, fixtures);

        seal_body(&mut body, keys, timestamp_ms)
            .map_err(|e| CaseFailure::Preparation(e.to_string()))?;
        request.body = Some(body);
    }

    Ok(request)
}

/// Encrypt and sign `data` in place; bodies without a `data` object are left alone
///
/// Returns whether the body was sealed.
pub fn seal_body(
    body: &mut Value,
    keys: &RequiredKeys,
    timestamp_ms: i64,
) -> Result<bool, CryptoError> {
    let Some(fields) = body.as_object_mut() else {
        return Ok(false);
    };
    let Some(Value::Object(data)) = fields.get(DATA_FIELD) else {
        return Ok(false);
    };

    let plaintext = compact(data);
    debug!("Payload before encryption: {}", plaintext);

    let ciphertext = encrypt_with_public_key(&plaintext, &keys.platform_public_key)?;
    let signature = sign_with_private_key(&ciphertext, &keys.channel_private_key)?;

    fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(timestamp_ms));
    fields.insert(DATA_FIELD.to_string(), Value::String(ciphertext));
    fields.insert(SIGN_FIELD.to_string(), Value::String(signature));

    Ok(true)
}

// Key order follows the source document
fn compact(data: &Map<String, Value>) -> String {
    Value::Object(data.clone()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{decrypt_with_private_key, test_keys, verify_with_public_key};
    use crate::fixtures::IdNumberGenerator;
    use crate::models::HttpMethod;
    use serde_json::json;

    fn keys() -> RequiredKeys {
        RequiredKeys {
            channel_private_key: test_keys::channel().private_key.clone(),
            platform_public_key: test_keys::platform().public_key.clone(),
        }
    }

    fn variables() -> BTreeMap<String, Value> {
        serde_json::from_value(json!({
            "user_id": "U100",
            "channel": "BN01",
            "token": "t-1"
        }))
        .unwrap()
    }

    #[test]
    fn test_seal_body() {
        let mut body = json!({
            "channelCode": "BN01",
            "data": {"zeta": 1, "alpha": "x", "userAuthInfo": {"idNo": "1"}}
        });

        assert!(seal_body(&mut body, &keys(), 1_700_000_000_123).unwrap());

        assert_eq!(body["timestamp"], 1_700_000_000_123i64);
        assert_eq!(body["channelCode"], "BN01");
        let ciphertext = body["data"].as_str().unwrap();
        let signature = body["sign"].as_str().unwrap();

        assert!(verify_with_public_key(
            ciphertext,
            &test_keys::channel().public_key,
            signature
        )
        .unwrap());

        let plaintext =
            decrypt_with_private_key(ciphertext, &test_keys::platform().private_key).unwrap();
        // compact, original key order
        assert_eq!(plaintext, r#"{"zeta":1,"alpha":"x","userAuthInfo":{"idNo":"1"}}"#);
    }

    #[test]
    fn test_seal_skips_bodies_without_data_object() {
        let mut plain = json!({"orderNo": "A1"});
        assert!(!seal_body(&mut plain, &keys(), 1).unwrap());
        assert_eq!(plain, json!({"orderNo": "A1"}));

        let mut already = json!({"data": "cipher", "sign": "s"});
        assert!(!seal_body(&mut already, &keys(), 1).unwrap());
        assert_eq!(already, json!({"data": "cipher", "sign": "s"}));
    }

    #[test]
    fn test_prepare_resolves_everything() {
        let case = TestCase::new("query", "Query", "GET", "/api/users/${user_id}")
            .unwrap()
            .with_header("Authorization", "Bearer ${token}")
            .with_param("channel", "${channel}")
            .with_param("page", 1)
            .with_timeout(7);

        let fixtures = Fixtures::new("11010519491231002X");
        let request = prepare_request(&case, &variables(), &fixtures, &keys(), 1).unwrap();

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "/api/users/U100");
        assert_eq!(request.headers["Authorization"], "Bearer t-1");
        assert_eq!(request.params["channel"], "BN01");
        assert_eq!(request.params["page"], 1);
        assert_eq!(request.timeout, Some(Duration::from_secs(7)));
        assert_eq!(request.body, None);
    }

    #[test]
    fn test_client_timeout_applies_without_case_timeout() {
        let case = TestCase::new("query", "Query", "GET", "/api/users").unwrap();
        let fixtures = Fixtures::new("11010519491231002X");
        let request = prepare_request(&case, &variables(), &fixtures, &keys(), 1).unwrap();

        assert_eq!(request.timeout, None);
    }

    #[test]
    fn test_prepare_injects_fixtures_before_sealing() {
        let case = TestCase::new("apply", "Apply", "POST", "/api/credit/apply")
            .unwrap()
            .with_body(json!({
                "channelCode": "${channel}",
                "data": {
                    "userId": "${user_id}",
                    "userAuthInfo": {"name": "Zhang San", "idNo": "", "birthDay": ""}
                }
            }));
        let id = IdNumberGenerator::seeded(5).generate();
        let fixtures = Fixtures::new(id.clone());

        let request = prepare_request(&case, &variables(), &fixtures, &keys(), 42).unwrap();
        let body = request.body.unwrap();
        assert_eq!(body["channelCode"], "BN01");
        assert_eq!(body["timestamp"], 42);

        let plaintext = decrypt_with_private_key(
            body["data"].as_str().unwrap(),
            &test_keys::platform().private_key,
        )
        .unwrap();
        let data: Value = serde_json::from_str(&plaintext).unwrap();
        assert_eq!(data["userId"], "U100");
        assert_eq!(data["userAuthInfo"]["idNo"], id.as_str());
        assert_eq!(
            data["userAuthInfo"]["birthDay"],
            format!("{}-{}-{}", &id[6..10], &id[10..12], &id[12..14])
        );

        // the case template is untouched
        assert_eq!(case.body.unwrap()["data"]["userAuthInfo"]["idNo"], "");
    }

    #[test]
    fn test_prepare_reports_bad_key() {
        let case = TestCase::new("apply", "Apply", "POST", "/x")
            .unwrap()
            .with_body(json!({"data": {"a": 1}}));
        let bad = RequiredKeys {
            channel_private_key: "bm90IGEga2V5".to_string(),
            platform_public_key: "bm90IGEga2V5".to_string(),
        };

        let err = prepare_request(&case, &BTreeMap::new(), &Fixtures::new("x"), &bad, 1)
            .unwrap_err();
        assert!(matches!(err, CaseFailure::Preparation(_)));
    }
}
