//! Content commit protocol.
//!
//! A content write and the save of the owning record's pointer are two
//! separate backend calls. A blob whose new ref never reaches its record is
//! orphaned, so a commit is only complete once the record points at the ref
//! the write returned. The record save is idempotent and retried; if it still
//! fails the caller gets `PartialFailure` with the new ref and can finish the
//! job later through [`ContentSync::retry_ref`].

use super::locator::ContentLocator;
use crate::config::SyncPolicy;
use crate::error::ApiError;
use crate::optimistic::OptimisticEngine;
use crate::records::{Record, RecordGateway};
use crate::types::{ContentRef, RecordId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Called with the record id, the old ref and the new ref when a write moved
/// an existing blob to another node.
pub type MigrationHook = Arc<dyn Fn(&str, &ContentRef, &ContentRef) + Send + Sync>;

pub struct ContentSync<R> {
    locator: Arc<ContentLocator>,
    gateway: Arc<RecordGateway<R>>,
    policy: SyncPolicy,
    on_migrate: Option<MigrationHook>,
}

impl<R: Record> ContentSync<R> {
    pub fn new(
        locator: Arc<ContentLocator>,
        gateway: Arc<RecordGateway<R>>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            locator,
            gateway,
            policy,
            on_migrate: None,
        }
    }

    /// Run `hook` whenever a commit relocates a blob to a different node,
    /// e.g. to drop caches keyed on the old node.
    pub fn with_migration_hook(mut self, hook: MigrationHook) -> Self {
        self.on_migrate = Some(hook);
        self
    }

    pub fn locator(&self) -> &ContentLocator {
        &self.locator
    }

    /// Load the blob of a record held by `engine`.
    pub async fn load<B: DeserializeOwned>(
        &self,
        engine: &OptimisticEngine<R>,
        record_id: &str,
    ) -> Result<Option<B>, ApiError> {
        let record = engine
            .store()
            .get(record_id)
            .ok_or_else(|| ApiError::RecordNotFound(record_id.to_string()))?;
        self.locator.read_content(record.content_ref()).await
    }

    /// Write `blob` for the record and make the record point at wherever it landed.
    ///
    /// Returns the ref now stored on the record.
    pub async fn commit<B: Serialize>(
        &self,
        engine: &OptimisticEngine<R>,
        record_id: &str,
        blob: &B,
    ) -> Result<ContentRef, ApiError> {
        let record = engine
            .store()
            .get(record_id)
            .ok_or_else(|| ApiError::RecordNotFound(record_id.to_string()))?;
        let submitted = record.content_ref().clone();

        let write = self
            .locator
            .write_content(self.gateway.entity(), &record, blob)
            .await?;

        if write.new_ref == submitted {
            debug!(record_id, content_ref = %submitted, "Content updated in place");
            return Ok(submitted);
        }
        if !submitted.is_unassigned() && write.new_ref.node_url != submitted.node_url {
            if let Some(hook) = &self.on_migrate {
                hook(record_id, &submitted, &write.new_ref);
            }
        }

        self.persist_ref(engine, record_id, write.new_ref).await
    }

    /// Re-issue the pointer save reported by an earlier `PartialFailure`.
    pub async fn retry_ref(
        &self,
        engine: &OptimisticEngine<R>,
        record_id: &str,
        new_ref: ContentRef,
    ) -> Result<ContentRef, ApiError> {
        self.persist_ref(engine, record_id, new_ref).await
    }

    async fn persist_ref(
        &self,
        engine: &OptimisticEngine<R>,
        record_id: &str,
        new_ref: ContentRef,
    ) -> Result<ContentRef, ApiError> {
        if engine.store().get(record_id).is_none() {
            return Err(ApiError::PartialFailure {
                record_id: record_id.to_string(),
                new_ref,
                message: "record is no longer loaded".to_string(),
            });
        }
        let targets: HashSet<RecordId> = HashSet::from([record_id.to_string()]);
        let result = engine
            .apply_update(
                &targets,
                |record| record.with_content_ref(new_ref.clone()),
                |record| self.save_with_retry(record),
            )
            .await;

        match result {
            Ok(()) => Ok(new_ref),
            Err(err) => {
                error!(
                    record_id,
                    new_ref = %new_ref,
                    error = %err,
                    "Content written but record pointer not saved"
                );
                Err(ApiError::PartialFailure {
                    record_id: record_id.to_string(),
                    new_ref,
                    message: err.to_string(),
                })
            }
        }
    }

    async fn save_with_retry(&self, record: R) -> Result<(), ApiError> {
        let attempts = self.policy.ref_save_attempts.max(1);
        let delay = Duration::from_millis(self.policy.ref_save_retry_delay_ms);
        let mut attempt = 1;
        loop {
            match self.gateway.save_record(&record).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(
                        record_id = %record.id(),
                        attempt,
                        attempts,
                        error = %err,
                        "Record pointer save failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
