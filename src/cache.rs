//! Profile cache and service.
//!
//! The signed-in user's profile is read often and changes rarely. It is
//! cached in memory and dropped on the events that can make it stale.

use crate::backend::{BackendRequest, NodeClient};
use crate::content::MigrationHook;
use crate::error::ApiError;
use crate::types::ContentRef;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Reasons to drop a cached profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationEvent {
    ProfileSaved,
    SignedOut,
    NodeMigrated,
    Manual,
}

struct CacheState<V> {
    value: Option<V>,
    /// Bumped on every invalidation; a load started under an older
    /// generation does not populate the cache.
    generation: u64,
}

pub struct ProfileCache<V> {
    state: Mutex<CacheState<V>>,
}

impl<V: Clone> ProfileCache<V> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                value: None,
                generation: 0,
            }),
        }
    }

    pub fn get(&self) -> Option<V> {
        self.state.lock().value.clone()
    }

    pub fn store(&self, value: V) {
        self.state.lock().value = Some(value);
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn invalidate(&self, event: InvalidationEvent) {
        let mut state = self.state.lock();
        state.value = None;
        state.generation += 1;
        debug!(?event, generation = state.generation, "Profile cache invalidated");
    }

    /// Return the cached value or run `load` and cache its result.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>>,
    {
        let started = {
            let state = self.state.lock();
            if let Some(value) = &state.value {
                return Ok(value.clone());
            }
            state.generation
        };

        let value = load().await?;

        let mut state = self.state.lock();
        if state.generation == started {
            state.value = Some(value.clone());
        } else {
            debug!(started, current = state.generation, "Discarding profile loaded before invalidation");
        }
        Ok(value)
    }
}

impl<V: Clone> Default for ProfileCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and writes the profile through `getProfile` / `saveProfile` on the default node.
pub struct ProfileService<P> {
    client: Arc<NodeClient>,
    cache: ProfileCache<Option<P>>,
}

impl<P> ProfileService<P>
where
    P: Clone + Serialize + DeserializeOwned,
{
    pub fn new(client: Arc<NodeClient>) -> Self {
        Self {
            client,
            cache: ProfileCache::new(),
        }
    }

    pub fn cache(&self) -> &ProfileCache<Option<P>> {
        &self.cache
    }

    /// `Ok(None)` when no profile has been saved yet.
    pub async fn profile(&self) -> Result<Option<P>, ApiError> {
        self.cache
            .get_or_load(move || async move {
                let envelope = self.client.send(&BackendRequest::GetProfile).await?;
                envelope
                    .data()
                    .map_err(|e| ApiError::malformed(self.client.default_node(), format!("getProfile: {}", e)))
            })
            .await
    }

    pub async fn save(&self, profile: &P) -> Result<(), ApiError> {
        let profile = serde_json::to_value(profile)
            .map_err(|e| ApiError::Serialization(format!("profile: {}", e)))?;
        self.client
            .send(&BackendRequest::SaveProfile { profile })
            .await?;
        self.cache.invalidate(InvalidationEvent::ProfileSaved);
        Ok(())
    }

    pub fn sign_out(&self) {
        self.cache.invalidate(InvalidationEvent::SignedOut);
    }

    pub fn node_migrated(&self) {
        self.cache.invalidate(InvalidationEvent::NodeMigrated);
    }
}

impl<P> ProfileService<P>
where
    P: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    /// Hook for [`crate::content::ContentSync::with_migration_hook`].
    pub fn migration_hook(self: &Arc<Self>) -> MigrationHook {
        let service = Arc::clone(self);
        Arc::new(move |record_id: &str, from: &ContentRef, to: &ContentRef| {
            debug!(record_id, %from, %to, "Content moved nodes, dropping cached profile");
            service.node_migrated();
        })
    }
}
