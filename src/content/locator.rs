//! Content Locator & Migration Resolver
//!
//! Reads blobs from the node a [`ContentRef`] points at, and writes blobs
//! through the default node. Every write may relocate the blob; the returned
//! ref is authoritative and must be stored on the owning record.

use crate::backend::{BackendRequest, FileContentBody, NodeClient, SaveRecordBody};
use crate::error::ApiError;
use crate::records::Record;
use crate::types::ContentRef;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a content write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentWrite {
    /// Where the blob lives now
    pub new_ref: ContentRef,
    /// True when `new_ref` differs from the ref the write was issued with
    pub relocated: bool,
}

pub struct ContentLocator {
    client: Arc<NodeClient>,
}

impl ContentLocator {
    pub fn new(client: Arc<NodeClient>) -> Self {
        Self { client }
    }

    pub fn default_node(&self) -> &str {
        self.client.default_node()
    }

    /// Fetch the blob `content_ref` points at.
    ///
    /// `Ok(None)` means the record has no blob yet; it never stands in for a
    /// failed read.
    pub async fn read_content<B: DeserializeOwned>(
        &self,
        content_ref: &ContentRef,
    ) -> Result<Option<B>, ApiError> {
        if content_ref.is_unassigned() {
            return Ok(None);
        }
        let node = content_ref.endpoint(self.client.default_node());
        let envelope = self
            .client
            .send_to(
                Some(node),
                &BackendRequest::GetFileContent {
                    file_id: content_ref.content_id.clone(),
                },
            )
            .await?;

        let body: FileContentBody = envelope
            .body()
            .map_err(|e| ApiError::malformed(node, format!("getFileContent: {}", e)))?;
        let blob = serde_json::from_str(&body.content)
            .map_err(|e| ApiError::malformed(node, format!("content {}: {}", content_ref, e)))?;
        debug!(content_ref = %content_ref, "Read content");
        Ok(Some(blob))
    }

    /// Write `blob` for `owner` as part of `save<entity>`.
    pub async fn write_content<R: Record, B: Serialize>(
        &self,
        entity: &str,
        owner: &R,
        blob: &B,
    ) -> Result<ContentWrite, ApiError> {
        let submitted = owner.content_ref();
        let item = serde_json::to_value(owner)
            .map_err(|e| ApiError::Serialization(format!("record {}: {}", owner.id(), e)))?;
        let content = serde_json::to_string(blob)
            .map_err(|e| ApiError::Serialization(format!("content of {}: {}", owner.id(), e)))?;

        let envelope = self
            .client
            .send(&BackendRequest::SaveRecord {
                entity: entity.to_string(),
                item,
                content: Some(content),
            })
            .await?;
        let body: SaveRecordBody = envelope
            .body()
            .map_err(|e| ApiError::malformed(self.client.default_node(), e))?;

        let new_ref = resolve_written_ref(self.client.default_node(), submitted, body)?;
        let relocated = &new_ref != submitted;
        if relocated {
            info!(
                record_id = %owner.id(),
                from = %submitted,
                to = %new_ref,
                "Content relocated by write"
            );
        }
        Ok(ContentWrite { new_ref, relocated })
    }
}

/// Combine the submitted ref with the migration fields of a write response.
fn resolve_written_ref(
    node: &str,
    submitted: &ContentRef,
    body: SaveRecordBody,
) -> Result<ContentRef, ApiError> {
    let content_id = body
        .new_vault_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| submitted.content_id.clone());
    if content_id.trim().is_empty() {
        return Err(ApiError::malformed(
            node,
            "content write for a new blob returned no content id",
        ));
    }
    let node_url = body.new_node_url.or_else(|| submitted.node_url.clone());
    Ok(ContentRef::new(content_id, node_url))
}
