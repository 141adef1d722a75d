//! Event types published on the record bus.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::Domain;
use crate::record::Record;

/// Type of record change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordEventKind {
    Created,
    Updated,
    Deleted,
}

impl RecordEventKind {
    /// Suffix used on the wire (`traffic:new`, `traffic:update`, ...).
    pub fn channel_suffix(&self) -> &'static str {
        match self {
            RecordEventKind::Created => "new",
            RecordEventKind::Updated => "update",
            RecordEventKind::Deleted => "delete",
        }
    }
}

/// A change to a record in one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEvent {
    pub kind: RecordEventKind,
    pub domain: Domain,
    pub record_id: String,
    /// The record after the change (`None` for deletions)
    pub record: Option<Record>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl RecordEvent {
    pub fn new(
        kind: RecordEventKind,
        domain: Domain,
        record_id: impl Into<String>,
        record: Option<Record>,
    ) -> Self {
        Self {
            kind,
            domain,
            record_id: record_id.into(),
            record,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn created(record: Record) -> Self {
        Self::new(RecordEventKind::Created, record.domain, record.id.clone(), Some(record))
    }

    pub fn updated(record: Record) -> Self {
        Self::new(RecordEventKind::Updated, record.domain, record.id.clone(), Some(record))
    }

    pub fn deleted(domain: Domain, record_id: impl Into<String>) -> Self {
        Self::new(RecordEventKind::Deleted, domain, record_id, None)
    }

    /// Channel name clients listen on, e.g. `air:new`.
    pub fn channel(&self) -> String {
        format!("{}:{}", self.domain, self.kind.channel_suffix())
    }

    /// JSON message pushed to live clients.
    ///
    /// Created/updated events carry the record; deletions carry the id.
    pub fn to_message(&self) -> serde_json::Value {
        let data = match &self.record {
            Some(record) => serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
            None => serde_json::Value::String(self.record_id.clone()),
        };
        serde_json::json!({
            "event": self.channel(),
            "data": data,
        })
    }
}
