//! Upload, optimistic attach, and node-scoped removal of attachments.
//!
//! New uploads always go to the current default node. Deletes always go to
//! the node recorded on the attachment. Removal is soft: the local reference
//! is dropped even when the remote delete cannot be issued or fails, and the
//! miss is logged rather than reported to the user.

use super::model::{AttachmentList, AttachmentRef};
use crate::backend::{BackendRequest, FilePayload, NodeClient, UploadBody};
use crate::error::ApiError;
use base64::Engine;
use parking_lot::RwLock;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A file to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Preview to show while uploading (images only)
    pub local_preview: Option<String>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
            local_preview: None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ApiError> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime_type = mime_type_for(path).to_string();
        let local_preview = if mime_type.starts_with("image/") {
            let absolute = path.canonicalize()?;
            Some(format!("file://{}", absolute.display()))
        } else {
            None
        };
        Ok(Self {
            file_name,
            mime_type,
            bytes,
            local_preview,
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_id: String,
    pub node_url: String,
    pub mime_type: String,
    pub preview_url: Option<String>,
}

/// Outcome of purging a set of attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub reclaimed: Vec<String>,
    pub unreclaimed: Vec<String>,
}

pub struct AttachmentManager {
    client: Arc<NodeClient>,
}

impl AttachmentManager {
    pub fn new(client: Arc<NodeClient>) -> Self {
        Self { client }
    }

    /// Upload to the default node.
    pub async fn upload(&self, file: &UploadFile, label: &str) -> Result<UploadedFile, ApiError> {
        let node = self.client.default_node();
        let request = BackendRequest::SaveItem {
            item: json!({ "title": label, "fileName": file.file_name }),
            file: FilePayload {
                file_name: file.file_name.clone(),
                mime_type: file.mime_type.clone(),
                file_data: base64::engine::general_purpose::STANDARD.encode(&file.bytes),
            },
        };
        let envelope = self.client.send(&request).await?;
        let body: UploadBody = envelope
            .body()
            .map_err(|e| ApiError::malformed(node, format!("saveItem: {}", e)))?;
        if body.file_id.trim().is_empty() {
            return Err(ApiError::malformed(node, "saveItem returned an empty fileId"));
        }

        let uploaded = UploadedFile {
            file_id: body.file_id,
            node_url: body
                .node_url
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| node.to_string()),
            mime_type: body.mime_type.unwrap_or_else(|| file.mime_type.clone()),
            preview_url: body.preview_url,
        };
        info!(
            file_id = %uploaded.file_id,
            node = %uploaded.node_url,
            bytes = file.bytes.len(),
            "Uploaded attachment"
        );
        Ok(uploaded)
    }

    /// Show a placeholder in `list` right away, upload, then swap the
    /// placeholder for the final ref or drop it on failure.
    ///
    /// If the placeholder was removed before the upload finished, the upload
    /// is deleted from its node and `AttachmentAbandoned` is returned.
    pub async fn attach(
        &self,
        list: &RwLock<AttachmentList>,
        file: UploadFile,
        label: &str,
    ) -> Result<AttachmentRef, ApiError> {
        let preview = file.local_preview.clone().filter(|_| file.is_image());
        let temp_id = list
            .write()
            .insert_pending(label, file.mime_type.clone(), preview);
        debug!(%temp_id, label, "Inserted pending attachment");

        match self.upload(&file, label).await {
            Ok(uploaded) => {
                let attachment = AttachmentRef {
                    file_id: uploaded.file_id,
                    node_url: Some(uploaded.node_url),
                    mime_type: uploaded.mime_type,
                    label: label.to_string(),
                    preview_url: uploaded.preview_url,
                };
                let resolved = list.write().resolve(temp_id, attachment.clone());
                if !resolved {
                    // Placeholder was removed mid-upload; the bytes are now unreferenced.
                    warn!(%temp_id, file_id = %attachment.file_id, "Placeholder gone, reclaiming upload");
                    self.remove(&attachment).await;
                    return Err(ApiError::AttachmentAbandoned {
                        file_id: attachment.file_id,
                    });
                }
                Ok(attachment)
            }
            Err(err) => {
                list.write().discard(temp_id);
                warn!(%temp_id, error = %err, "Upload failed, placeholder removed");
                Err(err)
            }
        }
    }

    /// Delete the attachment's bytes on the node that stores them.
    ///
    /// Returns whether the bytes were reclaimed. Failures are logged only.
    pub async fn remove(&self, attachment: &AttachmentRef) -> bool {
        let Some(node) = attachment.node_url.as_deref() else {
            warn!(file_id = %attachment.file_id, "Attachment has no node; bytes not reclaimed");
            return false;
        };
        let request = BackendRequest::DeleteRemoteFiles {
            file_ids: vec![attachment.file_id.clone()],
        };
        match self.client.send_to(Some(node), &request).await {
            Ok(_) => {
                debug!(file_id = %attachment.file_id, node, "Deleted attachment bytes");
                true
            }
            Err(err) => {
                warn!(
                    file_id = %attachment.file_id,
                    node,
                    error = %err,
                    "Failed to delete attachment bytes; keeping index consistent anyway"
                );
                false
            }
        }
    }

    /// Drop the attachment from `list`, then delete its bytes.
    pub async fn detach(&self, list: &RwLock<AttachmentList>, file_id: &str) -> bool {
        let removed = list.write().remove_committed(file_id);
        match removed {
            Some(attachment) => self.remove(&attachment).await,
            None => {
                debug!(file_id, "Attachment not in list");
                false
            }
        }
    }

    /// Delete many attachments with one request per owning node.
    pub async fn purge(&self, attachments: &[AttachmentRef]) -> PurgeReport {
        let mut report = PurgeReport::default();
        let mut by_node: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for attachment in attachments {
            match attachment.node_url.as_deref() {
                Some(node) => by_node
                    .entry(node)
                    .or_default()
                    .push(attachment.file_id.clone()),
                None => {
                    warn!(file_id = %attachment.file_id, "Attachment has no node; bytes not reclaimed");
                    report.unreclaimed.push(attachment.file_id.clone());
                }
            }
        }

        for (node, file_ids) in by_node {
            let request = BackendRequest::DeleteRemoteFiles {
                file_ids: file_ids.clone(),
            };
            match self.client.send_to(Some(node), &request).await {
                Ok(_) => report.reclaimed.extend(file_ids),
                Err(err) => {
                    warn!(node, files = file_ids.len(), error = %err, "Purge failed on node");
                    report.unreclaimed.extend(file_ids);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::model::AttachmentEntry;
    use crate::backend::MemoryBackend;
    use std::time::Duration;

    fn manager(backend: &Arc<MemoryBackend>) -> AttachmentManager {
        AttachmentManager::new(Arc::new(NodeClient::new(
            backend.clone(),
            backend.default_node().to_string(),
        )))
    }

    fn pinned(file_id: &str, node: Option<&str>) -> AttachmentRef {
        AttachmentRef {
            file_id: file_id.to_string(),
            node_url: node.map(str::to_string),
            mime_type: "application/pdf".to_string(),
            label: file_id.to_string(),
            preview_url: None,
        }
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_type_for(Path::new("a/B.PNG")), "image/png");
        assert!(mime_type_for(Path::new("slides.pptx")).contains("presentation"));
        assert_eq!(mime_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn from_path_reads_bytes_and_previews_images() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("photo.jpg");
        std::fs::write(&image, b"jpeg").unwrap();
        let doc = dir.path().join("notes.txt");
        std::fs::write(&doc, b"text").unwrap();

        let image = UploadFile::from_path(&image).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert!(image.local_preview.unwrap().starts_with("file://"));

        let doc = UploadFile::from_path(&doc).unwrap();
        assert_eq!(doc.bytes, b"text");
        assert!(doc.local_preview.is_none());
    }

    #[tokio::test]
    async fn upload_goes_to_default_node_with_base64_payload() {
        let backend = Arc::new(MemoryBackend::with_nodes(
            "memory://primary",
            &["memory://shard-1"],
        ));
        let uploaded = manager(&backend)
            .upload(&UploadFile::new("a.txt", "text/plain", b"hi".to_vec()), "A")
            .await
            .unwrap();

        assert_eq!(uploaded.node_url, "memory://primary");
        let request = &backend.requests_for("saveItem")[0];
        assert_eq!(request.node, "memory://primary");
        assert_eq!(request.payload["file"]["fileData"], "aGk=");
        assert_eq!(
            backend.uploaded_mime_type("memory://primary", &uploaded.file_id).as_deref(),
            Some("text/plain")
        );
    }

    #[tokio::test]
    async fn attach_resolves_placeholder_on_success() {
        let backend = Arc::new(MemoryBackend::new("memory://primary"));
        let list = RwLock::new(AttachmentList::new());

        let attachment = manager(&backend)
            .attach(&list, UploadFile::new("p.png", "image/png", vec![1, 2, 3]), "Photo")
            .await
            .unwrap();

        let list = list.read();
        assert_eq!(list.pending_count(), 0);
        assert_eq!(list.committed().next(), Some(&attachment));
        assert_eq!(attachment.node_url.as_deref(), Some("memory://primary"));
    }

    #[tokio::test]
    async fn attach_discards_placeholder_on_failure() {
        let backend = Arc::new(MemoryBackend::new("memory://primary"));
        backend.fail_next("saveItem", 1);
        let list = RwLock::new(AttachmentList::from_refs(vec![pinned("f0", Some("memory://primary"))]));

        let result = manager(&backend)
            .attach(&list, UploadFile::new("a.pdf", "application/pdf", vec![0]), "A")
            .await;

        assert!(result.is_err());
        assert_eq!(list.read().len(), 1);
        assert_eq!(list.read().pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn attach_reclaims_upload_when_placeholder_is_removed_mid_flight() {
        let backend = Arc::new(MemoryBackend::new("memory://primary"));
        backend.delay_next("saveItem", Duration::from_millis(50));
        let manager = manager(&backend);
        let list = RwLock::new(AttachmentList::new());

        let cancel_placeholder = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let temp_id = list
                .read()
                .entries()
                .iter()
                .find_map(|entry| match entry {
                    AttachmentEntry::Pending(p) => Some(p.temp_id),
                    AttachmentEntry::Committed(_) => None,
                })
                .unwrap();
            assert!(list.write().discard(temp_id));
        };
        let (result, ()) = tokio::join!(
            manager.attach(&list, UploadFile::new("a.pdf", "application/pdf", vec![7]), "A"),
            cancel_placeholder
        );

        let file_id = match result {
            Err(ApiError::AttachmentAbandoned { file_id }) => file_id,
            other => panic!("expected AttachmentAbandoned, got {:?}", other),
        };
        assert!(!backend.has_file("memory://primary", &file_id));
        assert!(list.read().is_empty());
        let deletes = backend.requests_for("deleteRemoteFiles");
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].node, "memory://primary");
    }

    #[tokio::test]
    async fn remove_routes_to_the_owning_node() {
        let backend = Arc::new(MemoryBackend::with_nodes(
            "memory://primary",
            &["memory://shard-1"],
        ));
        let manager = manager(&backend);

        assert!(manager.remove(&pinned("f1", Some("memory://shard-1"))).await);
        let deletes = backend.requests_for("deleteRemoteFiles");
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].node, "memory://shard-1");
    }

    #[tokio::test]
    async fn detach_is_soft_when_node_is_missing_or_failing() {
        let backend = Arc::new(MemoryBackend::new("memory://primary"));
        let manager = manager(&backend);
        let list = RwLock::new(AttachmentList::from_refs(vec![
            pinned("orphan", None),
            pinned("dead", Some("memory://retired")),
        ]));

        assert!(!manager.detach(&list, "orphan").await);
        assert!(!manager.detach(&list, "dead").await);
        assert!(list.read().is_empty());
        assert!(backend.requests_for("deleteRemoteFiles").is_empty());
    }

    #[tokio::test]
    async fn purge_sends_one_request_per_node() {
        let backend = Arc::new(MemoryBackend::with_nodes(
            "memory://primary",
            &["memory://shard-1"],
        ));
        let report = manager(&backend)
            .purge(&[
                pinned("a", Some("memory://primary")),
                pinned("b", Some("memory://shard-1")),
                pinned("c", Some("memory://primary")),
                pinned("d", None),
            ])
            .await;

        let deletes = backend.requests_for("deleteRemoteFiles");
        assert_eq!(deletes.len(), 2);
        let primary = deletes.iter().find(|r| r.node == "memory://primary").unwrap();
        assert_eq!(primary.payload["fileIds"], json!(["a", "c"]));
        assert_eq!(report.reclaimed.len(), 3);
        assert_eq!(report.unreclaimed, vec!["d".to_string()]);
    }
}
