//! In-process multi-node backend.
//!
//! Speaks the same action protocol as a real deployment, so everything above
//! [`NodeTransport`] runs unchanged against it. Used by the test suites and by
//! the CLI `--offline` mode.
//!
//! Placement: the first content write for an owner lands on the active node.
//! When a node capacity is set and the active node is full, new blobs go to the
//! next node. [`MemoryBackend::migrate_next_write`] forces the next content
//! write to move its blob to another node under a fresh content id.

use super::transport::NodeTransport;
use crate::error::ApiError;
use crate::types::ContentRef;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

/// A request as it reached a node.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub node: String,
    pub action: String,
    pub payload: Value,
}

#[derive(Debug, Clone)]
enum StoredFile {
    Content(String),
    Binary { mime_type: String },
}

#[derive(Debug, Clone)]
struct Placement {
    content_id: String,
    node: String,
}

#[derive(Default)]
struct MemoryState {
    /// node url -> file id -> file; a node exists iff it has an entry
    files: HashMap<String, HashMap<String, StoredFile>>,
    node_order: Vec<String>,
    active: usize,
    node_capacity: Option<usize>,
    migrate_next: bool,
    placements: HashMap<String, Placement>,
    records: HashMap<String, BTreeMap<String, Value>>,
    profile: Option<Value>,
    failures: HashMap<String, usize>,
    latencies: HashMap<String, VecDeque<Duration>>,
    requests: Vec<RecordedRequest>,
    next_id: u64,
}

impl MemoryState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn content_count(&self, node: &str) -> usize {
        self.files
            .get(node)
            .map(|files| {
                files
                    .values()
                    .filter(|f| matches!(f, StoredFile::Content(_)))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Node receiving new blobs, advancing past full nodes.
    fn placement_node(&mut self) -> String {
        if let Some(capacity) = self.node_capacity {
            while self.active + 1 < self.node_order.len()
                && self.content_count(&self.node_order[self.active]) >= capacity
            {
                self.active += 1;
            }
        }
        self.node_order[self.active].clone()
    }

    fn node_after(&self, node: &str) -> String {
        let index = self
            .node_order
            .iter()
            .position(|n| n == node)
            .unwrap_or(0);
        self.node_order[(index + 1) % self.node_order.len()].clone()
    }

    fn write_content(&mut self, owner: &str, content: String) -> Placement {
        let current = self.placements.get(owner).cloned();
        let reachable = current
            .as_ref()
            .map(|p| self.files.contains_key(&p.node))
            .unwrap_or(false);

        if let Some(current) = current.as_ref().filter(|_| reachable && !self.migrate_next) {
            if let Some(files) = self.files.get_mut(&current.node) {
                files.insert(current.content_id.clone(), StoredFile::Content(content));
            }
            return current.clone();
        }

        let target = match (&current, self.migrate_next) {
            (Some(current), true) if reachable => self.node_after(&current.node),
            _ => self.placement_node(),
        };
        self.migrate_next = false;

        if let Some(old) = current {
            if let Some(files) = self.files.get_mut(&old.node) {
                files.remove(&old.content_id);
            }
        }

        let placement = Placement {
            content_id: self.allocate_id("vault"),
            node: target,
        };
        self.files
            .entry(placement.node.clone())
            .or_default()
            .insert(placement.content_id.clone(), StoredFile::Content(content));
        self.placements.insert(owner.to_string(), placement.clone());
        placement
    }
}

fn error_envelope(message: impl Into<String>) -> Value {
    json!({ "status": "error", "message": message.into() })
}

fn entity_of<'a>(action: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    action
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(suffix))
        .filter(|entity| !entity.is_empty())
}

pub struct MemoryBackend {
    default_node: String,
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new(default_node: impl Into<String>) -> Self {
        Self::with_nodes(default_node, &[])
    }

    /// Backend with a default node plus additional shard nodes.
    pub fn with_nodes(default_node: impl Into<String>, shards: &[&str]) -> Self {
        let default_node = default_node.into();
        let mut state = MemoryState::default();
        state.node_order.push(default_node.clone());
        state.files.insert(default_node.clone(), HashMap::new());
        for shard in shards {
            state.node_order.push(shard.to_string());
            state.files.insert(shard.to_string(), HashMap::new());
        }
        Self {
            default_node,
            state: Mutex::new(state),
        }
    }

    pub fn default_node(&self) -> &str {
        &self.default_node
    }

    /// Cap the number of content blobs placed on each node.
    pub fn set_node_capacity(&self, capacity: Option<usize>) {
        self.state.lock().node_capacity = capacity;
    }

    /// Move the blob of the next content write to another node.
    pub fn migrate_next_write(&self) {
        self.state.lock().migrate_next = true;
    }

    /// Answer the next `times` requests for `action` with an error envelope.
    pub fn fail_next(&self, action: &str, times: usize) {
        *self.state.lock().failures.entry(action.to_string()).or_default() += times;
    }

    /// Delay the next request for `action` by `delay`.
    pub fn delay_next(&self, action: &str, delay: Duration) {
        self.state
            .lock()
            .latencies
            .entry(action.to_string())
            .or_default()
            .push_back(delay);
    }

    /// Make a node unreachable; its files are lost.
    pub fn drop_node(&self, node: &str) {
        self.state.lock().files.remove(node);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn requests_for(&self, action: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.action == action)
            .cloned()
            .collect()
    }

    pub fn has_file(&self, node: &str, file_id: &str) -> bool {
        self.state
            .lock()
            .files
            .get(node)
            .map(|files| files.contains_key(file_id))
            .unwrap_or(false)
    }

    pub fn content_count(&self, node: &str) -> usize {
        self.state.lock().content_count(node)
    }

    /// MIME type of an uploaded binary file.
    pub fn uploaded_mime_type(&self, node: &str, file_id: &str) -> Option<String> {
        match self.state.lock().files.get(node)?.get(file_id)? {
            StoredFile::Binary { mime_type } => Some(mime_type.clone()),
            StoredFile::Content(_) => None,
        }
    }

    /// Last item saved for a record.
    pub fn record(&self, entity: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .records
            .get(entity)
            .and_then(|records| records.get(id))
            .cloned()
    }

    pub fn seed_record(&self, entity: &str, item: Value) {
        if let Some(id) = item.get("id").and_then(Value::as_str).map(str::to_string) {
            self.state
                .lock()
                .records
                .entry(entity.to_string())
                .or_default()
                .insert(id, item);
        }
    }

    /// Where the backend currently keeps an owner's blob.
    pub fn placement(&self, owner: &str) -> Option<ContentRef> {
        self.state
            .lock()
            .placements
            .get(owner)
            .map(|p| ContentRef::new(p.content_id.clone(), Some(p.node.clone())))
    }

    fn take_delay(&self, action: &str) -> Option<Duration> {
        self.state
            .lock()
            .latencies
            .get_mut(action)
            .and_then(VecDeque::pop_front)
    }

    /// Records the request and applies failure injection.
    fn admit(&self, state: &mut MemoryState, node: &str, action: &str, payload: Value) -> Result<bool, ApiError> {
        if !state.files.contains_key(node) {
            return Err(ApiError::network(node, "node unreachable"));
        }
        state.requests.push(RecordedRequest {
            node: node.to_string(),
            action: action.to_string(),
            payload,
        });
        if let Some(remaining) = state.failures.get_mut(action).filter(|n| **n > 0) {
            *remaining -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn handle_get(&self, node: &str, query: &[(String, String)]) -> Result<Value, ApiError> {
        let param = |name: &str| {
            query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        let action = param("action").unwrap_or_default();
        let payload = Value::Object(
            query
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<Map<String, Value>>(),
        );

        let mut state = self.state.lock();
        if !self.admit(&mut state, node, &action, payload)? {
            return Ok(error_envelope("injected failure"));
        }

        if action == "getFileContent" {
            let file_id = param("fileId").unwrap_or_default();
            return Ok(match state.files.get(node).and_then(|f| f.get(&file_id)) {
                Some(StoredFile::Content(content)) => {
                    json!({ "status": "success", "content": content })
                }
                Some(StoredFile::Binary { .. }) => error_envelope("not a content file"),
                None => error_envelope(format!("File not found: {}", file_id)),
            });
        }

        if action == "getProfile" {
            return Ok(json!({ "status": "success", "data": state.profile.clone() }));
        }

        if let Some(entity) = entity_of(&action, "get", "s") {
            let page = param("page")
                .and_then(|p| p.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            let page_size = param("pageSize")
                .and_then(|p| p.parse::<usize>().ok())
                .unwrap_or(20)
                .max(1);
            let search = param("search").map(|s| s.to_lowercase());

            let matching: Vec<Value> = state
                .records
                .get(entity)
                .map(|records| {
                    records
                        .values()
                        .filter(|item| match &search {
                            Some(needle) => item.to_string().to_lowercase().contains(needle),
                            None => true,
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            let total = matching.len();
            let data: Vec<Value> = matching
                .into_iter()
                .skip((page - 1) * page_size)
                .take(page_size)
                .collect();
            return Ok(json!({ "status": "success", "data": data, "totalCount": total }));
        }

        Ok(error_envelope(format!("Unknown action: {}", action)))
    }

    fn handle_post(&self, node: &str, body: &Value) -> Result<Value, ApiError> {
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut state = self.state.lock();
        if !self.admit(&mut state, node, &action, body.clone())? {
            return Ok(error_envelope("injected failure"));
        }

        match action.as_str() {
            "deleteRemoteFiles" => {
                let ids: Vec<String> = body
                    .get("fileIds")
                    .and_then(Value::as_array)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let files = state.files.entry(node.to_string()).or_default();
                let deleted = ids.iter().filter(|id| files.remove(*id).is_some()).count();
                Ok(json!({ "status": "success", "deleted": deleted }))
            }
            "saveItem" => {
                let Some(file) = body.get("file") else {
                    return Ok(error_envelope("missing file"));
                };
                let mime_type = file
                    .get("mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("application/octet-stream")
                    .to_string();
                if file.get("fileData").and_then(Value::as_str).is_none() {
                    return Ok(error_envelope("missing fileData"));
                }
                let target = state.node_order[state.active].clone();
                let file_id = state.allocate_id("file");
                state.files.entry(target.clone()).or_default().insert(
                    file_id.clone(),
                    StoredFile::Binary {
                        mime_type: mime_type.clone(),
                    },
                );
                Ok(json!({
                    "status": "success",
                    "fileId": file_id,
                    "nodeUrl": target,
                    "mimeType": mime_type,
                }))
            }
            "saveProfile" => {
                state.profile = body.get("profile").cloned();
                Ok(json!({ "status": "success" }))
            }
            _ => {
                if let Some(entity) = entity_of(&action, "save", "") {
                    let Some(item) = body.get("item") else {
                        return Ok(error_envelope("missing item"));
                    };
                    let Some(id) = item.get("id").and_then(Value::as_str).map(str::to_string)
                    else {
                        return Ok(error_envelope("item has no id"));
                    };
                    state
                        .records
                        .entry(entity.to_string())
                        .or_default()
                        .insert(id.clone(), item.clone());

                    return Ok(match body.get("content").and_then(Value::as_str) {
                        Some(content) => {
                            let placement = state.write_content(&id, content.to_string());
                            json!({
                                "status": "success",
                                "newVaultId": placement.content_id,
                                "newNodeUrl": placement.node,
                            })
                        }
                        None => json!({ "status": "success" }),
                    });
                }

                if let Some(entity) = entity_of(&action, "delete", "") {
                    let id = body.get("id").and_then(Value::as_str).unwrap_or_default();
                    let removed = state
                        .records
                        .get_mut(entity)
                        .and_then(|records| records.remove(id))
                        .is_some();
                    if let Some(placement) = state.placements.remove(id) {
                        if let Some(files) = state.files.get_mut(&placement.node) {
                            files.remove(&placement.content_id);
                        }
                    }
                    return Ok(if removed {
                        json!({ "status": "success" })
                    } else {
                        error_envelope(format!("Record not found: {}", id))
                    });
                }

                Ok(error_envelope(format!("Unknown action: {}", action)))
            }
        }
    }
}

#[async_trait]
impl NodeTransport for MemoryBackend {
    async fn get(&self, node: &str, query: &[(String, String)]) -> Result<Value, ApiError> {
        let action = query
            .iter()
            .find(|(k, _)| k == "action")
            .map(|(_, v)| v.as_str())
            .unwrap_or_default();
        if let Some(delay) = self.take_delay(action) {
            tokio::time::sleep(delay).await;
        }
        self.handle_get(node, query)
    }

    async fn post(&self, node: &str, body: &Value) -> Result<Value, ApiError> {
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if let Some(delay) = self.take_delay(action) {
            tokio::time::sleep(delay).await;
        }
        self.handle_post(node, body)
    }
}
