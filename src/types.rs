//! Core types for the sharded content store client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// RecordId: application-assigned identifier of a Record
pub type RecordId = String;

/// Pointer to the node and id where a record's content blob currently lives.
///
/// An empty `content_id` means no blob has been written yet. A missing
/// `node_url` means the blob lives on the default node.
///
/// On the wire the pointer travels inside the record item as `vaultId` and
/// `nodeUrl`, which matches the `newVaultId` / `newNodeUrl` migration fields
/// of write responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    #[serde(rename = "vaultId", default)]
    pub content_id: String,
    #[serde(rename = "nodeUrl", default, skip_serializing_if = "Option::is_none")]
    pub node_url: Option<String>,
}

impl ContentRef {
    pub fn new(content_id: impl Into<String>, node_url: Option<String>) -> Self {
        Self {
            content_id: content_id.into(),
            node_url: node_url.filter(|url| !url.trim().is_empty()),
        }
    }

    /// A pointer for a record whose blob has not been created yet.
    pub fn unassigned() -> Self {
        Self::default()
    }

    /// True when no blob has been written for the owning record.
    pub fn is_unassigned(&self) -> bool {
        self.content_id.trim().is_empty()
    }

    /// Endpoint that stores the blob: the pinned node, or `default_node`.
    pub fn endpoint<'a>(&'a self, default_node: &'a str) -> &'a str {
        self.node_url.as_deref().unwrap_or(default_node)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_url {
            Some(node) => write!(f, "{}@{}", self.content_id, node),
            None => write!(f, "{}@default", self.content_id),
        }
    }
}
