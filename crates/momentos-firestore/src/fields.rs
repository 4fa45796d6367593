//! Helpers for mapping models to and from document fields.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

/// Builder for a document field map.
#[derive(Debug, Default, Clone)]
pub struct FieldMap(HashMap<String, Value>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl ToFirestoreValue) -> Self {
        self.0.insert(key.to_string(), value.to_firestore_value());
        self
    }

    pub fn into_value(self) -> Value {
        Value::map(self.0)
    }

    pub fn into_inner(self) -> HashMap<String, Value> {
        self.0
    }
}

/// Typed, lenient reader over a field map.
///
/// Missing or mistyped optional fields read as `None`/defaults; `require_*`
/// methods fail with `InvalidDocument` naming the document and field.
#[derive(Clone, Copy)]
pub struct FieldReader<'a> {
    fields: &'a HashMap<String, Value>,
    context: &'a str,
}

static EMPTY: std::sync::OnceLock<HashMap<String, Value>> = std::sync::OnceLock::new();

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a HashMap<String, Value>, context: &'a str) -> Self {
        Self { fields, context }
    }

    /// Reader over a stored document's fields.
    pub fn from_document(doc: &'a Document, context: &'a str) -> FirestoreResult<Self> {
        let fields = doc.fields.as_ref().ok_or_else(|| {
            FirestoreError::invalid_document(format!("{}: document has no fields", context))
        })?;
        Ok(Self::new(fields, context))
    }

    pub fn get<T: FromFirestoreValue>(&self, key: &str) -> Option<T> {
        self.fields.get(key).and_then(T::from_firestore_value)
    }

    pub fn require<T: FromFirestoreValue>(&self, key: &str) -> FirestoreResult<T> {
        self.get(key).ok_or_else(|| {
            FirestoreError::invalid_document(format!("{}: missing or invalid field '{}'", self.context, key))
        })
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key)
    }

    pub fn string_or_default(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }

    pub fn u64(&self, key: &str) -> u64 {
        self.get(key).unwrap_or(0)
    }

    pub fn u32(&self, key: &str) -> u32 {
        self.get(key).unwrap_or(0)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key)
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        self.get(key).unwrap_or(default)
    }

    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key)
    }

    pub fn strings(&self, key: &str) -> Vec<String> {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(String::from_firestore_value).collect())
            .unwrap_or_default()
    }

    pub fn string_set(&self, key: &str) -> BTreeSet<String> {
        self.strings(key).into_iter().collect()
    }

    pub fn counts(&self, key: &str) -> BTreeMap<String, u64> {
        self.fields
            .get(key)
            .and_then(Value::as_map)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| u64::from_firestore_value(v).map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reader over a nested map. Missing maps read as empty.
    pub fn map(&self, key: &str) -> FieldReader<'a> {
        let fields = self
            .fields
            .get(key)
            .and_then(Value::as_map)
            .unwrap_or_else(|| EMPTY.get_or_init(HashMap::new));
        FieldReader {
            fields,
            context: self.context,
        }
    }

    /// Readers over an array of maps.
    pub fn maps(&self, key: &str) -> Vec<FieldReader<'a>> {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_map)
                    .map(|fields| FieldReader {
                        fields,
                        context: self.context,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_present(&self, key: &str) -> bool {
        self.fields.get(key).is_some_and(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_defaults_and_nesting() {
        let inner = FieldMap::new().set("total", 3u64).into_value();
        let fields = FieldMap::new()
            .set("name", "album")
            .set("counters", inner)
            .set("labels", vec!["a".to_string(), "b".to_string()])
            .set("closed_at", None::<DateTime<Utc>>)
            .into_inner();
        let reader = FieldReader::new(&fields, "albums/a");

        assert_eq!(reader.string("name").as_deref(), Some("album"));
        assert_eq!(reader.map("counters").u64("total"), 3);
        assert_eq!(reader.map("missing").u64("total"), 0);
        assert_eq!(reader.strings("labels"), vec!["a", "b"]);
        assert_eq!(reader.timestamp("closed_at"), None);
        assert!(!reader.is_present("closed_at"));
        assert!(reader.require::<String>("nope").is_err());
    }
}
