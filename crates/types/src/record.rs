use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised when a raw inventory payload cannot be treated as a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("resource record must be a JSON object")]
    NotAnObject,

    #[error("resource record has no usable 'id' field")]
    MissingId,
}

/// One inventory item (for example a virtual machine instance).
///
/// The body is kept as the provider returned it; the id is extracted once so
/// that deduplication and node-name fallback never have to re-read the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRecord {
    id: String,
    body: Value,
}

impl ResourceRecord {
    /// Wrap a provider payload. The payload must be an object with a string or
    /// numeric `id`.
    pub fn from_value(body: Value) -> Result<Self, RecordError> {
        let Value::Object(map) = &body else {
            return Err(RecordError::NotAnObject);
        };
        let id = match map.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(RecordError::MissingId),
        };
        Ok(Self { id, body })
    }

    /// The record's unique id, stringified.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Top-level property lookup. `null` is reported as absent.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.body.get(name).filter(|value| !value.is_null())
    }
}

impl TryFrom<Value> for ResourceRecord {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Records collected for one inventory scope, deduplicated by id.
///
/// Insertion order is preserved; the first record seen for an id is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: IndexMap<String, ResourceRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Returns `false` when a record with the same id was
    /// already present, in which case the set is unchanged.
    pub fn insert(&mut self, record: ResourceRecord) -> bool {
        if self.records.contains_key(record.id()) {
            return false;
        }
        self.records.insert(record.id().to_string(), record);
        true
    }

    pub fn get(&self, id: &str) -> Option<&ResourceRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values()
    }
}

impl IntoIterator for RecordSet {
    type Item = ResourceRecord;
    type IntoIter = indexmap::map::IntoValues<String, ResourceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

impl FromIterator<ResourceRecord> for RecordSet {
    fn from_iter<T: IntoIterator<Item = ResourceRecord>>(iter: T) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_are_stringified() {
        let record = ResourceRecord::from_value(json!({"id": 8812345678901234567u64, "name": "vm-1"})).expect("record");
        assert_eq!(record.id(), "8812345678901234567");
    }

    #[test]
    fn rejects_payloads_without_an_id() {
        assert_eq!(ResourceRecord::from_value(json!({"name": "vm-1"})), Err(RecordError::MissingId));
        assert_eq!(ResourceRecord::from_value(json!({"id": ""})), Err(RecordError::MissingId));
        assert_eq!(ResourceRecord::from_value(json!(["vm-1"])), Err(RecordError::NotAnObject));
    }

    #[test]
    fn null_properties_read_as_absent() {
        let record = ResourceRecord::from_value(json!({"id": "1", "hostname": null, "zone": "us-east1-b"})).expect("record");
        assert!(record.property("hostname").is_none());
        assert_eq!(record.property("zone"), Some(&json!("us-east1-b")));
    }

    #[test]
    fn record_set_keeps_first_record_per_id() {
        let mut set = RecordSet::new();
        assert!(set.insert(ResourceRecord::from_value(json!({"id": "1", "name": "first"})).expect("record")));
        assert!(!set.insert(ResourceRecord::from_value(json!({"id": "1", "name": "second"})).expect("record")));
        assert!(set.insert(ResourceRecord::from_value(json!({"id": "2", "name": "other"})).expect("record")));

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("1").and_then(|r| r.property("name")), Some(&json!("first")));
        let ids: Vec<_> = set.iter().map(ResourceRecord::id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
