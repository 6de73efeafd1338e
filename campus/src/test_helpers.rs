//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::ClientError;
use crate::net::api::ApiClient;
use crate::net::csrf::CsrfToken;
use crate::net::transport::{ApiRequest, ApiResponse, Transport};

enum Scripted {
    Response(ApiResponse),
    Network(String),
}

/// Transport that replays scripted responses and records every request.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Response(ApiResponse::new(status, body.to_string())));
        self
    }

    pub(crate) fn push_text(&self, status: u16, body: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Response(ApiResponse::new(status, body)));
        self
    }

    pub(crate) fn push_network_error(&self, message: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Network(message.to_owned()));
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Response(resp)) => Ok(resp),
            Some(Scripted::Network(msg)) => Err(ClientError::Network(msg)),
            None => Err(ClientError::Network("no scripted response".into())),
        }
    }
}

pub(crate) fn client_with_csrf(transport: &ScriptedTransport) -> ApiClient<ScriptedTransport> {
    ApiClient::new(transport.clone(), CsrfToken::new("test-token"))
}

pub(crate) fn client_without_csrf(transport: &ScriptedTransport) -> ApiClient<ScriptedTransport> {
    ApiClient::new(transport.clone(), None)
}

pub(crate) fn busy_body() -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": "Event is currently being processed. Please try again later."
    })
}
