//! Record persistence and paginated search against the default node.

use super::Record;
use crate::backend::{BackendRequest, NodeClient};
use crate::error::ApiError;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Paginated search parameters. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            search: None,
        }
    }
}

impl RecordQuery {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordPage<R> {
    pub items: Vec<R>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<R> RecordPage<R> {
    pub fn has_more(&self) -> bool {
        u64::from(self.page) * u64::from(self.page_size) < self.total_count
    }
}

/// Saves, deletes and lists records of one entity type.
pub struct RecordGateway<R> {
    client: Arc<NodeClient>,
    entity: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> RecordGateway<R> {
    /// `entity` is the action suffix, e.g. `"ActivityVault"` for `saveActivityVault`.
    pub fn new(client: Arc<NodeClient>, entity: impl Into<String>) -> Self {
        Self {
            client,
            entity: entity.into(),
            _record: PhantomData,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn client(&self) -> &Arc<NodeClient> {
        &self.client
    }

    /// Save the record item without content. Idempotent.
    pub async fn save_record(&self, record: &R) -> Result<(), ApiError> {
        let item = serde_json::to_value(record)
            .map_err(|e| ApiError::Serialization(format!("record {}: {}", record.id(), e)))?;
        self.client
            .send(&BackendRequest::SaveRecord {
                entity: self.entity.clone(),
                item,
                content: None,
            })
            .await?;
        debug!(entity = %self.entity, record_id = %record.id(), "Saved record");
        Ok(())
    }

    pub async fn delete_record(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .send(&BackendRequest::DeleteRecord {
                entity: self.entity.clone(),
                id: id.to_string(),
            })
            .await?;
        debug!(entity = %self.entity, record_id = %id, "Deleted record");
        Ok(())
    }

    pub async fn fetch_page(&self, query: &RecordQuery) -> Result<RecordPage<R>, ApiError> {
        let envelope = self
            .client
            .send(&BackendRequest::ListRecords {
                entity: self.entity.clone(),
                page: query.page,
                page_size: query.page_size,
                search: query.search.clone(),
            })
            .await?;
        let items: Vec<R> = envelope
            .data()
            .map_err(|e| {
                ApiError::malformed(
                    self.client.default_node(),
                    format!("get{}s data: {}", self.entity, e),
                )
            })?
            .unwrap_or_default();
        let total_count = envelope.total_count.unwrap_or(items.len() as u64);
        Ok(RecordPage {
            items,
            total_count,
            page: query.page,
            page_size: query.page_size,
        })
    }
}
