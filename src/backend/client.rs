//! Request routing and envelope checking.

use super::request::{BackendRequest, WireRequest};
use super::response::Envelope;
use super::transport::NodeTransport;
use crate::error::ApiError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sends typed requests to a node, defaulting to the primary endpoint.
pub struct NodeClient {
    transport: Arc<dyn NodeTransport>,
    default_node: String,
}

impl NodeClient {
    pub fn new(transport: Arc<dyn NodeTransport>, default_node: impl Into<String>) -> Self {
        Self {
            transport,
            default_node: default_node.into(),
        }
    }

    pub fn default_node(&self) -> &str {
        &self.default_node
    }

    /// Send to the default node.
    pub async fn send(&self, request: &BackendRequest) -> Result<Envelope, ApiError> {
        self.send_to(None, request).await
    }

    /// Send to `node`, or the default node when `None`.
    ///
    /// A `status: "error"` envelope is reported as `NetworkFailure`, the same
    /// as a transport error.
    pub async fn send_to(
        &self,
        node: Option<&str>,
        request: &BackendRequest,
    ) -> Result<Envelope, ApiError> {
        let node = node.unwrap_or(&self.default_node);
        let action = request.action();
        debug!(node = %node, action = %action, "Sending backend request");

        let raw = match request.to_wire() {
            WireRequest::Get(query) => self.transport.get(node, &query).await?,
            WireRequest::Post(body) => self.transport.post(node, &body).await?,
        };

        let envelope: Envelope = serde_json::from_value(raw)
            .map_err(|e| ApiError::malformed(node, format!("{} response: {}", action, e)))?;

        if !envelope.is_success() {
            let message = envelope
                .message
                .clone()
                .unwrap_or_else(|| "backend reported an error".to_string());
            warn!(node = %node, action = %action, message = %message, "Backend rejected request");
            return Err(ApiError::network(node, format!("{} failed: {}", action, message)));
        }

        Ok(envelope)
    }
}
