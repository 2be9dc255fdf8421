//! In-memory transport for engine tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{HttpError, HttpRequest, HttpResponse, Transport};

type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync>;

/// Answers every request through a closure and records what it was sent
pub struct MockTransport {
    responder: Responder,
    requests: Mutex<Vec<HttpRequest>>,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn new(
        responder: impl Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn response(status_code: u16, body: impl Into<String>) -> HttpResponse {
    HttpResponse {
        status_code,
        headers: HashMap::new(),
        body: body.into(),
        duration_ms: 1,
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let result = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        result
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
