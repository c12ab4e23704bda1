//! Scripted transport for driver tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::Transport;
use crate::error::{RgaError, RgaResult};

/// In-memory transport that answers from a table of canned responses and
/// records every resource it is asked for.
///
/// Unknown resources get an empty 200 document, which is what the
/// instrument produces for most set operations.
pub struct MockTransport {
    responses: HashMap<String, String>,
    failing_paths: HashSet<String>,
    default_response: String,
    delay: Option<Duration>,
    fail_all: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Empty transport answering 200 with an empty document.
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            failing_paths: HashSet::new(),
            default_response: "HTTP/1.1 200 OK\r\n\r\n{\"data\":{}}".to_string(),
            delay: None,
            fail_all: false,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Canned raw response for the exact resource (including any query).
    pub fn respond(mut self, resource: &str, response: &str) -> Self {
        self.responses
            .insert(resource.to_string(), response.to_string());
        self
    }

    /// Canned 200 response with the given JSON body.
    pub fn respond_json(self, resource: &str, body: &str) -> Self {
        self.respond(resource, &format!("HTTP/1.1 200 OK\r\n\r\n{body}"))
    }

    /// Fail exchanges for this resource as if the device were unreachable.
    pub fn fail_on(mut self, resource: &str) -> Self {
        self.failing_paths.insert(resource.to_string());
        self
    }

    /// Fail every exchange.
    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Delay every exchange, for serialization tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle to the request log, valid after the transport is boxed.
    pub fn log_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn exchange(&mut self, request: &str) -> RgaResult<Vec<u8>> {
        let resource = request
            .strip_prefix("GET ")
            .and_then(|r| r.split("\r\n").next())
            .unwrap_or(request)
            .to_string();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(resource.clone());
        }
        if self.fail_all || self.failing_paths.contains(&resource) {
            return Err(RgaError::NotConnected);
        }

        let response = self
            .responses
            .get(&resource)
            .unwrap_or(&self.default_response);
        Ok(response.clone().into_bytes())
    }
}
