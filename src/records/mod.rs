//! Records
//!
//! Small, searchable metadata entities. Each record owns exactly one content
//! blob through its [`ContentRef`]; the blob itself is only reachable through
//! that pointer.

pub mod gateway;

pub use gateway::{RecordGateway, RecordPage, RecordQuery};

use crate::error::ApiError;
use crate::types::ContentRef;
use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A metadata entity that points at a content blob.
///
/// The serialized form is the `item` sent to the backend and must carry the
/// content pointer, usually by flattening a [`ContentRef`] field.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn content_ref(&self) -> &ContentRef;
    fn set_content_ref(&mut self, content_ref: ContentRef);

    /// Copy of this record pointing at `content_ref`.
    fn with_content_ref(&self, content_ref: ContentRef) -> Self {
        let mut next = self.clone();
        next.set_content_ref(content_ref);
        next
    }
}

/// Schema-less record, for entities only known at runtime (CLI, scripts).
///
/// The item must be a JSON object with a string `id`; the content pointer is
/// read from and written to its `vaultId` / `nodeUrl` fields.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRecord {
    id: String,
    content: ContentRef,
    item: Map<String, Value>,
}

impl JsonRecord {
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        let Value::Object(item) = value else {
            return Err(ApiError::Serialization(
                "record item must be a JSON object".to_string(),
            ));
        };
        let id = match item.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(ApiError::Serialization(
                    "record item needs a non-empty id".to_string(),
                ))
            }
        };
        let content = ContentRef::new(
            item.get("vaultId").and_then(Value::as_str).unwrap_or_default(),
            item.get("nodeUrl").and_then(Value::as_str).map(str::to_string),
        );
        Ok(Self { id, content, item })
    }

    pub fn item(&self) -> &Map<String, Value> {
        &self.item
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.item)
    }
}

impl Record for JsonRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn content_ref(&self) -> &ContentRef {
        &self.content
    }

    fn set_content_ref(&mut self, content_ref: ContentRef) {
        self.item.insert(
            "vaultId".to_string(),
            Value::String(content_ref.content_id.clone()),
        );
        match &content_ref.node_url {
            Some(node) => {
                self.item
                    .insert("nodeUrl".to_string(), Value::String(node.clone()));
            }
            None => {
                self.item.remove("nodeUrl");
            }
        }
        self.content = content_ref;
    }
}

impl Serialize for JsonRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.item.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        JsonRecord::from_value(value).map_err(serde::de::Error::custom)
    }
}
