//! Backend requests as a tagged union.
//!
//! Every node exposes a single endpoint and dispatches on an `action` string.
//! Each variant here maps to exactly one action and knows its wire shape, so
//! the field names the backend expects live in one place.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Binary file carried by a `saveItem` upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    pub file_name: String,
    pub mime_type: String,
    /// Base64 encoded file bytes
    pub file_data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendRequest {
    /// `GET ?action=getFileContent&fileId=<id>`
    GetFileContent { file_id: String },
    /// `POST {action: 'save<Entity>', item, content?}`
    SaveRecord {
        entity: String,
        item: Value,
        content: Option<String>,
    },
    /// `GET ?action=get<Entity>s&page=&pageSize=&search=`
    ListRecords {
        entity: String,
        page: u32,
        page_size: u32,
        search: Option<String>,
    },
    /// `POST {action: 'delete<Entity>', id}`
    DeleteRecord { entity: String, id: String },
    /// `POST {action: 'deleteRemoteFiles', fileIds}`; must go to the owning node
    DeleteRemoteFiles { file_ids: Vec<String> },
    /// `POST {action: 'saveItem', item, file}`
    SaveItem { item: Value, file: FilePayload },
    /// `GET ?action=getProfile`
    GetProfile,
    /// `POST {action: 'saveProfile', profile}`
    SaveProfile { profile: Value },
}

/// HTTP shape of a request: query parameters for GET, JSON body for POST.
#[derive(Debug, Clone, PartialEq)]
pub enum WireRequest {
    Get(Vec<(String, String)>),
    Post(Value),
}

impl BackendRequest {
    pub fn action(&self) -> String {
        match self {
            BackendRequest::GetFileContent { .. } => "getFileContent".to_string(),
            BackendRequest::SaveRecord { entity, .. } => format!("save{}", entity),
            BackendRequest::ListRecords { entity, .. } => format!("get{}s", entity),
            BackendRequest::DeleteRecord { entity, .. } => format!("delete{}", entity),
            BackendRequest::DeleteRemoteFiles { .. } => "deleteRemoteFiles".to_string(),
            BackendRequest::SaveItem { .. } => "saveItem".to_string(),
            BackendRequest::GetProfile => "getProfile".to_string(),
            BackendRequest::SaveProfile { .. } => "saveProfile".to_string(),
        }
    }

    pub fn to_wire(&self) -> WireRequest {
        let action = self.action();
        match self {
            BackendRequest::GetFileContent { file_id } => WireRequest::Get(vec![
                ("action".to_string(), action),
                ("fileId".to_string(), file_id.clone()),
            ]),
            BackendRequest::ListRecords {
                page,
                page_size,
                search,
                ..
            } => {
                let mut query = vec![
                    ("action".to_string(), action),
                    ("page".to_string(), page.to_string()),
                    ("pageSize".to_string(), page_size.to_string()),
                ];
                if let Some(search) = search.as_ref().filter(|s| !s.trim().is_empty()) {
                    query.push(("search".to_string(), search.clone()));
                }
                WireRequest::Get(query)
            }
            BackendRequest::GetProfile => WireRequest::Get(vec![("action".to_string(), action)]),
            BackendRequest::SaveRecord { item, content, .. } => {
                let mut body = json!({ "action": action, "item": item });
                if let Some(content) = content {
                    body["content"] = Value::String(content.clone());
                }
                WireRequest::Post(body)
            }
            BackendRequest::DeleteRecord { id, .. } => {
                WireRequest::Post(json!({ "action": action, "id": id }))
            }
            BackendRequest::DeleteRemoteFiles { file_ids } => {
                WireRequest::Post(json!({ "action": action, "fileIds": file_ids }))
            }
            BackendRequest::SaveItem { item, file } => {
                WireRequest::Post(json!({ "action": action, "item": item, "file": file }))
            }
            BackendRequest::SaveProfile { profile } => {
                WireRequest::Post(json!({ "action": action, "profile": profile }))
            }
        }
    }
}
