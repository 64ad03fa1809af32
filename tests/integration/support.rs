use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vaultsync::attachment::{AttachmentList, AttachmentManager};
use vaultsync::backend::{MemoryBackend, NodeClient};
use vaultsync::config::SyncPolicy;
use vaultsync::content::{ContentLocator, ContentSync};
use vaultsync::records::{Record, RecordGateway};
use vaultsync::types::ContentRef;

pub const PRIMARY: &str = "memory://primary";
pub const SHARD: &str = "memory://shard-1";
pub const ENTITY: &str = "Consultation";

/// A typed record whose content pointer is flattened into the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub content: ContentRef,
}

impl Consultation {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            content: ContentRef::unassigned(),
        }
    }
}

impl Record for Consultation {
    fn id(&self) -> &str {
        &self.id
    }

    fn content_ref(&self) -> &ContentRef {
        &self.content
    }

    fn set_content_ref(&mut self, content_ref: ContentRef) {
        self.content = content_ref;
    }
}

/// Content blob of a consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationNotes {
    pub notes: String,
    #[serde(default)]
    pub attachments: AttachmentList,
}

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub client: Arc<NodeClient>,
}

pub fn harness() -> Harness {
    let backend = Arc::new(MemoryBackend::with_nodes(PRIMARY, &[SHARD]));
    let client = Arc::new(NodeClient::new(backend.clone(), PRIMARY));
    Harness { backend, client }
}

impl Harness {
    pub fn locator(&self) -> Arc<ContentLocator> {
        Arc::new(ContentLocator::new(self.client.clone()))
    }

    pub fn gateway(&self) -> Arc<RecordGateway<Consultation>> {
        Arc::new(RecordGateway::new(self.client.clone(), ENTITY))
    }

    pub fn sync(&self) -> ContentSync<Consultation> {
        ContentSync::new(
            self.locator(),
            self.gateway(),
            SyncPolicy {
                ref_save_attempts: 2,
                ref_save_retry_delay_ms: 1,
            },
        )
    }

    pub fn attachments(&self) -> AttachmentManager {
        AttachmentManager::new(self.client.clone())
    }
}
