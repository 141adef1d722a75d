//! In-memory record store.
//!
//! Each domain is a vector kept in insertion order, so "newest first" is a
//! reverse walk and ties on identical timestamps resolve by insertion.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use smartcity_core::{Domain, Record};

use crate::error::StorageError;
use crate::traits::RecordStore;
use crate::types::{RecordQuery, SortOrder};

/// Record store backed by a concurrent map of per-domain vectors.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    collections: DashMap<Domain, Vec<Record>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all domains.
    pub fn len(&self) -> usize {
        self.collections.iter().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, domain: Domain, payload: Value) -> Result<Record, StorageError> {
        let record = Record::new(domain, payload)?;
        self.collections
            .entry(domain)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        domain: Domain,
        id: &str,
        payload: Value,
    ) -> Result<Record, StorageError> {
        let mut collection = self
            .collections
            .get_mut(&domain)
            .ok_or_else(|| StorageError::not_found(domain, id))?;
        let record = collection
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StorageError::not_found(domain, id))?;
        record.replace_data(payload)?;
        Ok(record.clone())
    }

    async fn delete(&self, domain: Domain, id: &str) -> Result<(), StorageError> {
        let mut collection = self
            .collections
            .get_mut(&domain)
            .ok_or_else(|| StorageError::not_found(domain, id))?;
        let before = collection.len();
        collection.retain(|r| r.id != id);
        if collection.len() == before {
            return Err(StorageError::not_found(domain, id));
        }
        Ok(())
    }

    async fn find(&self, domain: Domain, query: &RecordQuery) -> Result<Vec<Record>, StorageError> {
        let Some(collection) = self.collections.get(&domain) else {
            return Ok(Vec::new());
        };
        let limit = query.limit.unwrap_or(usize::MAX);
        let matching = |r: &&Record| query.matches(r);

        let records: Vec<Record> = match query.sort {
            SortOrder::NewestFirst => collection
                .iter()
                .rev()
                .filter(matching)
                .take(limit)
                .cloned()
                .collect(),
            SortOrder::OldestFirst => collection
                .iter()
                .filter(matching)
                .take(limit)
                .cloned()
                .collect(),
        };
        Ok(records)
    }

    async fn count(&self, domain: Domain) -> Result<u64, StorageError> {
        Ok(self
            .collections
            .get(&domain)
            .map(|c| c.len() as u64)
            .unwrap_or(0))
    }
}
