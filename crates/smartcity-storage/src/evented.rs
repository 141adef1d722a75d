//! EventedStore - a record store wrapper that emits events after writes.
//!
//! This wrapper delegates all operations to an inner store while publishing
//! a [`RecordEvent`] to the broadcaster after each successful write.
//!
//! # Example
//!
//! ```ignore
//! use smartcity_core::events::EventBroadcaster;
//! use smartcity_storage::{EventedStore, InMemoryRecordStore};
//!
//! let broadcaster = EventBroadcaster::new_shared();
//! let store = EventedStore::new(InMemoryRecordStore::new(), broadcaster);
//!
//! // Subscribers receive `traffic:new`
//! store.insert(Domain::Traffic, json!({"intensity": 40})).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use smartcity_core::events::{EventBroadcaster, RecordEvent};
use smartcity_core::{Domain, Record};
use tracing::debug;

use crate::error::StorageError;
use crate::traits::RecordStore;
use crate::types::RecordQuery;

/// A store wrapper that emits events after successful writes.
///
/// Events are emitted **after** the inner write succeeds, so every event
/// corresponds to an actual change.
pub struct EventedStore<S: RecordStore> {
    inner: S,
    broadcaster: Arc<EventBroadcaster>,
}

impl<S: RecordStore> EventedStore<S> {
    /// Create a new evented store wrapper.
    pub fn new(inner: S, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { inner, broadcaster }
    }

    /// Get a reference to the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a reference to the broadcaster.
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    fn emit(&self, event: RecordEvent) {
        if self.broadcaster.listener_count() == 0 {
            return;
        }
        let channel = event.channel();
        let record_id = event.record_id.clone();
        let count = self.broadcaster.publish(event);
        debug!(
            channel = %channel,
            record_id = %record_id,
            listeners = count,
            "Emitted record event"
        );
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for EventedStore<S> {
    async fn insert(&self, domain: Domain, payload: Value) -> Result<Record, StorageError> {
        let record = self.inner.insert(domain, payload).await?;
        self.emit(RecordEvent::created(record.clone()));
        Ok(record)
    }

    async fn update(
        &self,
        domain: Domain,
        id: &str,
        payload: Value,
    ) -> Result<Record, StorageError> {
        let record = self.inner.update(domain, id, payload).await?;
        self.emit(RecordEvent::updated(record.clone()));
        Ok(record)
    }

    async fn delete(&self, domain: Domain, id: &str) -> Result<(), StorageError> {
        self.inner.delete(domain, id).await?;
        self.emit(RecordEvent::deleted(domain, id));
        Ok(())
    }

    async fn find(&self, domain: Domain, query: &RecordQuery) -> Result<Vec<Record>, StorageError> {
        // Read operations don't emit events
        self.inner.find(domain, query).await
    }

    async fn count(&self, domain: Domain) -> Result<u64, StorageError> {
        self.inner.count(domain).await
    }

    async fn latest(&self, domain: Domain) -> Result<Option<Record>, StorageError> {
        self.inner.latest(domain).await
    }
}
