use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::path::PathKey;
use crate::tree::Tree;

/// Key under which dates travel through serde.
pub const DATE_TAG: &str = "$date";

pub type Map = IndexMap<String, Value>;

/// One node of a form record. Objects keep their insertion order, which is
/// also the traversal order.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    pub fn object() -> Self {
        Value::Object(Map::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A leaf is anything that is not an object or a sequence. Dates are leaves.
    pub fn is_leaf(&self) -> bool {
        !self.is_container()
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Field lookup on objects; `None` for everything else.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(field))
    }

    /// Leaf equality as the diff sees it: dates compare by instant, `NaN`
    /// equals itself, containers never equal anything.
    pub fn same_leaf(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Date(a), Value::Date(b)) => a.timestamp_millis() == b.timestamp_millis(),
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                false
            }
            (a, b) => a == b,
        }
    }

    /// Plain JSON rendering. Dates become RFC 3339 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl Tree for Value {
    fn is_branch(&self) -> bool {
        self.is_container()
    }

    fn child(&self, key: &PathKey) -> Option<&Self> {
        match (self, key) {
            (Value::Array(items), PathKey::Index(i)) => items.get(*i),
            (Value::Object(map), key) => map.get(&key.to_field_name()),
            _ => None,
        }
    }

    fn child_mut(&mut self, key: &PathKey) -> Option<&mut Self> {
        match (self, key) {
            (Value::Array(items), PathKey::Index(i)) => items.get_mut(*i),
            (Value::Object(map), key) => map.get_mut(&key.to_field_name()),
            _ => None,
        }
    }

    fn set_child(&mut self, key: PathKey, child: Self) -> bool {
        match (self, key) {
            (Value::Array(items), PathKey::Index(i)) => {
                if i < items.len() {
                    items[i] = child;
                } else {
                    items.resize(i, Value::Null);
                    items.push(child);
                }
                true
            }
            (Value::Object(map), key) => {
                map.insert(key.to_field_name(), child);
                true
            }
            _ => false,
        }
    }

    fn entries(&self) -> Vec<(PathKey, &Self)> {
        match self {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (PathKey::Index(i), v))
                .collect(),
            Value::Object(map) => map.iter().map(|(k, v)| (PathKey::from(k), v)).collect(),
            _ => Vec::new(),
        }
    }

    fn entries_mut(&mut self) -> Vec<(PathKey, &mut Self)> {
        match self {
            Value::Array(items) => items
                .iter_mut()
                .enumerate()
                .map(|(i, v)| (PathKey::Index(i), v))
                .collect(),
            Value::Object(map) => map
                .iter_mut()
                .map(|(k, v)| (PathKey::from(k), v))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn empty_branch() -> Self {
        Value::object()
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                if let Some(date) = tagged_date(map.len(), map.get(DATE_TAG).and_then(|v| v.as_str()))
                {
                    return Value::Date(date);
                }
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

fn tagged_date(len: usize, raw: Option<&str>) -> Option<DateTime<Utc>> {
    if len != 1 {
        return None;
    }
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATE_TAG, &d.to_rfc3339())?;
                map.end()
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a form record value")
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            map.insert(key, value);
        }
        if let Some(date) = tagged_date(map.len(), map.get(DATE_TAG).and_then(Value::as_str)) {
            return Ok(Value::Date(date));
        }
        Ok(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn dates_survive_a_serde_round_trip() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut map = Map::new();
        map.insert("due".into(), Value::Date(at));
        map.insert("title".into(), Value::from("report"));
        let record = Value::Object(map);

        let text = serde_json::to_string(&record).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn objects_with_extra_keys_are_not_dates() {
        let v = Value::from(json!({"$date": "2024-03-01T12:00:00Z", "note": "x"}));
        assert!(v.as_object().is_some());
    }

    #[test]
    fn json_objects_keep_document_order() {
        let keys = |v: &Value| v.as_object().unwrap().keys().cloned().collect::<Vec<_>>();

        let built = Value::from(json!({"zeta": "z", "alpha": "a", "mid": 1}));
        assert_eq!(keys(&built), ["zeta", "alpha", "mid"]);

        let parsed: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        assert_eq!(keys(&Value::from(parsed)), ["b", "a"]);
        assert_eq!(
            serde_json::to_string(&built.to_json()).unwrap(),
            r#"{"zeta":"z","alpha":"a","mid":1.0}"#
        );
    }

    #[test]
    fn leaf_detection() {
        assert!(Value::Null.is_leaf());
        assert!(Value::from("x").is_leaf());
        assert!(Value::Date(Utc::now()).is_leaf());
        assert!(!Value::from(json!([1])).is_leaf());
        assert!(!Value::object().is_leaf());
    }

    #[test]
    fn nan_is_the_same_leaf_as_nan() {
        assert!(Value::Number(f64::NAN).same_leaf(&Value::Number(f64::NAN)));
        assert!(!Value::Number(1.0).same_leaf(&Value::from("1")));
    }

    #[test]
    fn writing_past_the_end_pads_with_null() {
        let mut v = Value::from(json!([1]));
        assert!(v.set_child(PathKey::Index(3), Value::from("x")));
        assert_eq!(v, Value::from(json!([1, null, null, "x"])));
    }

    #[test]
    fn field_keys_do_not_address_sequences() {
        let mut v = Value::from(json!([1]));
        assert!(!v.set_child(PathKey::Field("name".into()), Value::Null));
    }
}
