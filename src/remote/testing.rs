// ABOUTME: Scripted in-memory transport for exercising backend calls without a server
// ABOUTME: Replays queued responses in order and records every request it receives

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::client::{HttpResponse, NetworkFailure, RequestSpec, Transport};

#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, NetworkFailure>>>,
    /// Served once the script runs dry.
    fallback: Mutex<Option<HttpResponse>>,
    requests: Mutex<Vec<RequestSpec>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.script.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn push_failure(&self, failure: NetworkFailure) {
        self.script.lock().unwrap().push_back(Err(failure));
    }

    pub fn repeat_json(&self, status: u16, body: Value) {
        *self.fallback.lock().unwrap() = Some(HttpResponse {
            status,
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<RequestSpec> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, NetworkFailure> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match self.fallback.lock().unwrap().clone() {
            Some(response) => Ok(response),
            None => Err(NetworkFailure::Other("script exhausted".to_string())),
        }
    }
}
