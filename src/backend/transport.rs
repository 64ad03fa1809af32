//! Transport port for talking to a node, and the reqwest-backed adapter.

use crate::config::BackendConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Raw JSON exchange with one node endpoint.
///
/// Implementations return `NetworkFailure` for transport errors and non-2xx
/// HTTP statuses, and `MalformedResponse` when the body is not JSON. The
/// envelope `status` is checked one layer up in [`super::NodeClient`].
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn get(&self, node: &str, query: &[(String, String)]) -> Result<Value, ApiError>;
    async fn post(&self, node: &str, body: &Value) -> Result<Value, ApiError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            request_timeout,
        })
    }

    fn map_send_error(&self, node: &str, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.request_timeout)
        } else {
            ApiError::network(node, err)
        }
    }

    async fn decode(&self, node: &str, response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::network(node, format!("HTTP {}", status)));
        }
        let text = response
            .text()
            .await
            .map_err(|e| self.map_send_error(node, e))?;
        serde_json::from_str(&text).map_err(|e| ApiError::malformed(node, e))
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn get(&self, node: &str, query: &[(String, String)]) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(node)
            .query(query)
            .send()
            .await
            .map_err(|e| self.map_send_error(node, e))?;
        self.decode(node, response).await
    }

    async fn post(&self, node: &str, body: &Value) -> Result<Value, ApiError> {
        let response = self
            .client
            .post(node)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(node, e))?;
        self.decode(node, response).await
    }
}
