#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracking_sdk::{ApiError, ApiRequest, ApiResponse, ClientConfig, TrackingClient, Transport};

/// In-memory transport: replays queued responses and records every request it sees.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<ApiResponse>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: Value) -> &Self {
        self.responses.lock().unwrap().push_back(ApiResponse::new(status, body));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ApiError::Transport(format!("no response queued for {}", request.path)))
    }
}

pub fn client(transport: &MockTransport) -> TrackingClient<MockTransport> {
    TrackingClient::with_transport(ClientConfig::new("test-token"), transport.clone()).unwrap()
}

pub fn query_value<'r>(request: &'r ApiRequest, key: &str) -> Option<&'r str> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
