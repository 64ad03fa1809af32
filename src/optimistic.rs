//! Optimistic Mutation Engine
//!
//! Applies record changes to the visible store before the backend confirms
//! them, then persists. A batch is all-or-nothing at the visible-state layer:
//! if any persist call fails, the store is restored to the exact snapshot taken
//! before the mutation and the first error is returned.
//!
//! Overlapping calls that target the same record are not serialized; whichever
//! settles last determines the visible state.

use crate::error::ApiError;
use crate::records::Record;
use crate::store::RecordStore;
use crate::types::RecordId;
use futures::future::join_all;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct OptimisticEngine<R> {
    store: RecordStore<R>,
}

impl<R: Record> OptimisticEngine<R> {
    pub fn new(store: RecordStore<R>) -> Self {
        Self { store }
    }

    /// Read-only view for rendering and lookups.
    pub fn store(&self) -> &RecordStore<R> {
        &self.store
    }

    /// Replace the collection with a freshly fetched page.
    pub fn load_page(&self, records: Vec<R>) {
        self.store.set_state(Arc::new(records));
    }

    /// Mutate every record in `target_ids`, show the result, then persist each
    /// mutated record.
    pub async fn apply_update<M, P, Fut>(
        &self,
        target_ids: &HashSet<RecordId>,
        mutate: M,
        persist: P,
    ) -> Result<(), ApiError>
    where
        M: Fn(&R) -> R,
        P: Fn(R) -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        let original = self.store.snapshot();
        let mut mutated = Vec::new();
        let next: Vec<R> = original
            .iter()
            .map(|record| {
                if target_ids.contains(record.id()) {
                    let changed = mutate(record);
                    mutated.push(changed.clone());
                    changed
                } else {
                    record.clone()
                }
            })
            .collect();

        if mutated.is_empty() {
            debug!(targets = target_ids.len(), "No records matched update");
            return Ok(());
        }

        self.store.set_state(Arc::new(next));
        let count = mutated.len();
        let results = join_all(mutated.into_iter().map(&persist)).await;
        self.settle(original, results, "update", count)
    }

    /// Remove every record in `target_ids` from view, then delete each one.
    pub async fn apply_delete<D, Fut>(
        &self,
        target_ids: &HashSet<RecordId>,
        delete_fn: D,
    ) -> Result<(), ApiError>
    where
        D: Fn(RecordId) -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        let original = self.store.snapshot();
        let (removed, kept): (Vec<&R>, Vec<&R>) = original
            .iter()
            .partition(|record| target_ids.contains(record.id()));

        if removed.is_empty() {
            debug!(targets = target_ids.len(), "No records matched delete");
            return Ok(());
        }

        let removed_ids: Vec<RecordId> = removed.iter().map(|r| r.id().to_string()).collect();
        self.store
            .set_state(Arc::new(kept.into_iter().cloned().collect()));
        let count = removed_ids.len();
        let results = join_all(removed_ids.into_iter().map(&delete_fn)).await;
        self.settle(original, results, "delete", count)
    }

    /// Show a newly created record at the front of the collection, then persist it.
    pub async fn apply_insert<P, Fut>(&self, record: R, persist: P) -> Result<(), ApiError>
    where
        P: FnOnce(R) -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        let original = self.store.snapshot();
        let mut next = Vec::with_capacity(original.len() + 1);
        next.push(record.clone());
        next.extend(original.iter().filter(|r| r.id() != record.id()).cloned());

        self.store.set_state(Arc::new(next));
        let result = persist(record).await;
        self.settle(original, vec![result], "insert", 1)
    }

    fn settle(
        &self,
        original: Arc<Vec<R>>,
        results: Vec<Result<(), ApiError>>,
        operation: &str,
        count: usize,
    ) -> Result<(), ApiError> {
        let mut failures = results.into_iter().filter_map(Result::err);
        match failures.next() {
            None => {
                debug!(operation, count, "Optimistic batch committed");
                Ok(())
            }
            Some(first) => {
                let failed = 1 + failures.count();
                self.store.set_state(original);
                warn!(
                    operation,
                    count,
                    failed,
                    error = %first,
                    "Optimistic batch failed, restored previous state"
                );
                Err(first)
            }
        }
    }
}
