//! Response envelope shared by every action, plus the per-action bodies.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// `{status, data?, totalCount?, message?, ...action fields}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status: Status,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub total_count: Option<u64>,
    /// Action specific top-level fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Decode the action specific top-level fields.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }

    /// Decode `data`, treating an absent or null payload as `None`.
    pub fn data<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.data {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some),
        }
    }
}

/// `getFileContent`: the blob as a JSON-encoded string
#[derive(Debug, Clone, Deserialize)]
pub struct FileContentBody {
    pub content: String,
}

/// `save<Entity>`: optional migration fields
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecordBody {
    #[serde(default)]
    pub new_vault_id: Option<String>,
    #[serde(default)]
    pub new_node_url: Option<String>,
}

/// `saveItem`: where the uploaded bytes landed
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    pub file_id: String,
    #[serde(default)]
    pub node_url: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
}
