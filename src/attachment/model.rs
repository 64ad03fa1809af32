//! Attachment references embedded in content blobs.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A binary file pinned to the node that stores its bytes.
///
/// The node may differ from the node holding the blob that embeds the ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_url: Option<String>,
    pub mime_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl AttachmentRef {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Placeholder shown while an upload is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub temp_id: Uuid,
    pub label: String,
    pub mime_type: String,
    /// Local preview for images, available before the upload completes
    pub local_preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentEntry {
    Pending(PendingAttachment),
    Committed(AttachmentRef),
}

impl AttachmentEntry {
    pub fn is_pending(&self) -> bool {
        matches!(self, AttachmentEntry::Pending(_))
    }

    pub fn label(&self) -> &str {
        match self {
            AttachmentEntry::Pending(p) => &p.label,
            AttachmentEntry::Committed(c) => &c.label,
        }
    }

    /// URL to render a thumbnail from, if any.
    pub fn preview(&self) -> Option<&str> {
        match self {
            AttachmentEntry::Pending(p) => p.local_preview.as_deref(),
            AttachmentEntry::Committed(c) => c.preview_url.as_deref(),
        }
    }
}

/// Ordered attachments of one blob, including in-flight placeholders.
///
/// Serializes as the array of committed refs only; pending entries never
/// leave the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentList {
    entries: Vec<AttachmentEntry>,
}

impl AttachmentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_refs(refs: Vec<AttachmentRef>) -> Self {
        Self {
            entries: refs.into_iter().map(AttachmentEntry::Committed).collect(),
        }
    }

    pub fn entries(&self) -> &[AttachmentEntry] {
        &self.entries
    }

    pub fn committed(&self) -> impl Iterator<Item = &AttachmentRef> {
        self.entries.iter().filter_map(|entry| match entry {
            AttachmentEntry::Committed(c) => Some(c),
            AttachmentEntry::Pending(_) => None,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, attachment: AttachmentRef) {
        self.entries.push(AttachmentEntry::Committed(attachment));
    }

    /// Append a placeholder and return its temporary id.
    pub fn insert_pending(
        &mut self,
        label: impl Into<String>,
        mime_type: impl Into<String>,
        local_preview: Option<String>,
    ) -> Uuid {
        let temp_id = Uuid::new_v4();
        self.entries.push(AttachmentEntry::Pending(PendingAttachment {
            temp_id,
            label: label.into(),
            mime_type: mime_type.into(),
            local_preview,
        }));
        temp_id
    }

    fn position_of_pending(&self, temp_id: Uuid) -> Option<usize> {
        self.entries.iter().position(|entry| {
            matches!(entry, AttachmentEntry::Pending(p) if p.temp_id == temp_id)
        })
    }

    /// Replace the placeholder in place with its final ref.
    ///
    /// Returns false when the placeholder is gone (e.g. the user removed it
    /// while the upload was running).
    pub fn resolve(&mut self, temp_id: Uuid, attachment: AttachmentRef) -> bool {
        match self.position_of_pending(temp_id) {
            Some(index) => {
                self.entries[index] = AttachmentEntry::Committed(attachment);
                true
            }
            None => false,
        }
    }

    /// Drop a placeholder after a failed upload.
    pub fn discard(&mut self, temp_id: Uuid) -> bool {
        match self.position_of_pending(temp_id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_committed(&mut self, file_id: &str) -> Option<AttachmentRef> {
        let index = self.entries.iter().position(|entry| {
            matches!(entry, AttachmentEntry::Committed(c) if c.file_id == file_id)
        })?;
        match self.entries.remove(index) {
            AttachmentEntry::Committed(c) => Some(c),
            AttachmentEntry::Pending(_) => None,
        }
    }
}

impl Serialize for AttachmentList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.committed())
    }
}

impl<'de> Deserialize<'de> for AttachmentList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<AttachmentRef>::deserialize(deserializer).map(AttachmentList::from_refs)
    }
}
