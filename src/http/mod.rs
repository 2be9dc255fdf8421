//! HTTP transport module
//!
//! The engine talks to the service under test through [`Transport`]; the
//! reqwest-backed [`HttpClient`] is the production implementation.

#![allow(dead_code)]

mod client;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{HttpClient, HttpError, HttpRequest, HttpResponse};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Request/response exchange with the service under test
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;

    async fn get(
        &self,
        url: &str,
        headers: BTreeMap<String, String>,
        params: BTreeMap<String, Value>,
    ) -> Result<HttpResponse, HttpError> {
        self.send(HttpRequest::get(url).headers(headers).params(params))
            .await
    }

    async fn post(
        &self,
        url: &str,
        headers: BTreeMap<String, String>,
        body: Option<Value>,
    ) -> Result<HttpResponse, HttpError> {
        let mut request = HttpRequest::post(url).headers(headers);
        request.body = body;
        self.send(request).await
    }

    /// Release pooled connections
    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::mock::{response, MockTransport};
    use super::*;
    use crate::models::HttpMethod;
    use serde_json::json;

    #[test]
    fn test_get_sends_params_without_body() {
        let transport = MockTransport::new(|_| Ok(response(200, "{}")));
        let params = BTreeMap::from([("page".to_string(), json!(2))]);

        let resp = tokio_test::block_on(transport.get("/users", BTreeMap::new(), params)).unwrap();
        assert!(resp.is_success());

        let sent = transport.requests();
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[0].params["page"], json!(2));
        assert!(sent[0].body.is_none());
    }

    #[test]
    fn test_post_sends_headers_and_body() {
        let transport = MockTransport::new(|_| Ok(response(201, "")));
        let headers = BTreeMap::from([("X-Channel".to_string(), "BN01".to_string())]);

        let resp = tokio_test::block_on(transport.post(
            "/apply",
            headers,
            Some(json!({"amount": 5000})),
        ))
        .unwrap();
        assert_eq!(resp.status_code, 201);

        let sent = transport.requests();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].headers["X-Channel"], "BN01");
        assert_eq!(sent[0].body, Some(json!({"amount": 5000})));
    }
}
