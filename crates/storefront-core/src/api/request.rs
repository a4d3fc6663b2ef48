use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::ApiError;

/// Description of an outbound API call that can be rebuilt and re-sent.
///
/// `attempt` counts dispatches of this logical request: 0 for the first,
/// 1 for the single replay after a token refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    attempt: u32,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            body: None,
            attempt: 0,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Request(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether this request has already been replayed after a refresh
    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }

    /// The same request, marked as its post-refresh replay
    pub fn into_retry(mut self) -> Self {
        self.attempt += 1;
        self
    }
}
