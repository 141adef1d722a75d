//! The record store contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use smartcity_core::{Domain, Record};

use crate::error::StorageError;
use crate::types::RecordQuery;

/// The trait every record store backend implements.
///
/// Implementations must be thread-safe (`Send + Sync`); the server shares one
/// store across all in-flight requests and background tasks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stores a new record built from a JSON object payload.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidRecord` if the payload is not an object.
    async fn insert(&self, domain: Domain, payload: Value) -> Result<Record, StorageError>;

    /// Replaces the payload of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn update(&self, domain: Domain, id: &str, payload: Value)
    -> Result<Record, StorageError>;

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn delete(&self, domain: Domain, id: &str) -> Result<(), StorageError>;

    /// Returns the records of a domain matching the query.
    async fn find(&self, domain: Domain, query: &RecordQuery) -> Result<Vec<Record>, StorageError>;

    /// Returns the number of records in a domain.
    async fn count(&self, domain: Domain) -> Result<u64, StorageError>;

    /// Returns the most recently created record, if any.
    async fn latest(&self, domain: Domain) -> Result<Option<Record>, StorageError> {
        let mut records = self.find(domain, &RecordQuery::newest(1)).await?;
        Ok(records.pop())
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn insert(&self, domain: Domain, payload: Value) -> Result<Record, StorageError> {
        (**self).insert(domain, payload).await
    }

    async fn update(
        &self,
        domain: Domain,
        id: &str,
        payload: Value,
    ) -> Result<Record, StorageError> {
        (**self).update(domain, id, payload).await
    }

    async fn delete(&self, domain: Domain, id: &str) -> Result<(), StorageError> {
        (**self).delete(domain, id).await
    }

    async fn find(&self, domain: Domain, query: &RecordQuery) -> Result<Vec<Record>, StorageError> {
        (**self).find(domain, query).await
    }

    async fn count(&self, domain: Domain) -> Result<u64, StorageError> {
        (**self).count(domain).await
    }

    async fn latest(&self, domain: Domain) -> Result<Option<Record>, StorageError> {
        (**self).latest(domain).await
    }
}
