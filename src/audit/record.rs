//! Audit record types.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Opaque token binding a request's start and end hooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Ordered multi-map of string fields (headers, query arguments, form fields).
///
/// Keys keep first-seen order and repeated keys keep every value. A key with a
/// single value serializes as a string, a repeated key as an array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, Vec<String>)>,
}

impl FieldMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any earlier values for the same key.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// First value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// Every value stored under `key`, in arrival order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate keys with all their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.append(key, value);
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, values) in &self.entries {
            match values.as_slice() {
                [single] => map.serialize_entry(key, single)?,
                many => map.serialize_entry(key, many)?,
            }
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldValues {
    One(String),
    Many(Vec<String>),
}

struct FieldMapVisitor;

impl<'de> Visitor<'de> for FieldMapVisitor {
    type Value = FieldMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of strings or string arrays")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMap, A::Error> {
        let mut map = FieldMap::new();
        while let Some((key, values)) = access.next_entry::<String, FieldValues>()? {
            match values {
                FieldValues::One(value) => map.append(key, value),
                FieldValues::Many(values) => {
                    for value in values {
                        map.append(key.clone(), value);
                    }
                }
            }
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FieldMapVisitor)
    }
}

/// Persisted representation of one completed request/response exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Store-assigned insertion sequence; `None` until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "request_id")]
    pub correlation_id: CorrelationId,
    pub method: String,
    /// Request path, without the query string.
    pub url: String,
    pub client_ip: Option<String>,
    pub request_headers: FieldMap,
    pub request_args: FieldMap,
    pub request_form: FieldMap,
    /// Parsed request body when the content type declared JSON and it parsed.
    pub request_json: Option<serde_json::Value>,
    pub status_code: u16,
    pub response_headers: FieldMap,
    /// Parsed JSON when possible, otherwise the raw text as a JSON string.
    pub response_data: Option<serde_json::Value>,
    /// Processing time in milliseconds.
    #[serde(rename = "process_time")]
    pub duration_ms: Option<f64>,
    /// Request arrival, epoch seconds.
    pub timestamp: f64,
    /// Mounted unit that served the request; `None` for host-native routes.
    #[serde(rename = "module")]
    pub unit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_field_map_keeps_repeated_values() {
        let map: FieldMap = [("tag", "a"), ("page", "1"), ("tag", "b")]
            .into_iter()
            .collect();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("tag"), Some("a"));
        assert_eq!(map.get_all("tag"), ["a".to_string(), "b".to_string()]);
        assert!(map.get_all("missing").is_empty());
    }

    #[test]
    fn test_field_map_serializes_single_and_multi_values() {
        let map: FieldMap = [("tag", "a"), ("page", "1"), ("tag", "b")]
            .into_iter()
            .collect();

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"tag":["a","b"],"page":"1"}"#);

        let back: FieldMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_field_map_preserves_order() {
        let map: FieldMap = [("z", "1"), ("a", "2"), ("m", "3")].into_iter().collect();
        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_record_uses_wire_names() {
        let record = AuditRecord {
            id: None,
            correlation_id: CorrelationId::from("abc"),
            method: "GET".to_string(),
            url: "/example".to_string(),
            client_ip: None,
            request_headers: FieldMap::new(),
            request_args: FieldMap::new(),
            request_form: FieldMap::new(),
            request_json: None,
            status_code: 200,
            response_headers: FieldMap::new(),
            response_data: None,
            duration_ms: Some(1.5),
            timestamp: 1_700_000_000.0,
            unit: Some("example".to_string()),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["request_id"], "abc");
        assert_eq!(value["process_time"], 1.5);
        assert_eq!(value["module"], "example");
        assert!(value.get("id").is_none());
    }
}
