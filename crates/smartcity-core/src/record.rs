//! The record envelope stored per domain.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::domain::Domain;
use crate::error::CoreError;

/// Field names owned by the envelope; payload fields with these names are dropped.
const RESERVED_FIELDS: [&str; 4] = ["id", "domain", "createdAt", "updatedAt"];

/// A stored record: envelope metadata plus the free-form payload.
///
/// The payload is flattened on the wire, so a traffic record serializes as
/// `{"id": "...", "domain": "traffic", "createdAt": "...", "intensity": 42, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub domain: Domain,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Record {
    /// Build a new record from a JSON object payload.
    pub fn new(domain: Domain, payload: Value) -> Result<Self, CoreError> {
        let now = OffsetDateTime::now_utc();
        Ok(Self {
            id: crate::generate_id(),
            domain,
            created_at: now,
            updated_at: now,
            data: payload_object(payload)?,
        })
    }

    /// Replace the payload, keeping identity and creation time.
    pub fn replace_data(&mut self, payload: Value) -> Result<(), CoreError> {
        self.data = payload_object(payload)?;
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    /// Look up a payload field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

fn payload_object(payload: Value) -> Result<Map<String, Value>, CoreError> {
    match payload {
        Value::Object(mut map) => {
            for reserved in RESERVED_FIELDS {
                map.remove(reserved);
            }
            Ok(map)
        }
        other => Err(CoreError::invalid_record(format!(
            "record payload must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_strips_reserved_fields() {
        let record = Record::new(
            Domain::Traffic,
            json!({"id": "spoofed", "createdAt": "never", "intensity": 42}),
        )
        .unwrap();

        assert_ne!(record.id, "spoofed");
        assert_eq!(record.field("intensity"), Some(&json!(42)));
        assert!(record.field("createdAt").is_none());
    }

    #[test]
    fn test_rejects_non_object_payload() {
        let err = Record::new(Domain::Air, json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));
    }

    #[test]
    fn test_payload_is_flattened() {
        let record = Record::new(Domain::Air, json!({"AQI": 120, "city": "Lucknow"})).unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["domain"], "air");
        assert_eq!(value["AQI"], 120);
        assert!(value["createdAt"].is_string());

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_replace_data_keeps_identity() {
        let mut record = Record::new(Domain::Energy, json!({"usage": 100})).unwrap();
        let id = record.id.clone();
        let created = record.created_at;

        record.replace_data(json!({"usage": 900})).unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.created_at, created);
        assert_eq!(record.field("usage"), Some(&json!(900)));
    }
}
