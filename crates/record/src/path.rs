use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One segment of a [`FieldPath`]: an object field name or a sequence index.
///
/// Numeric strings always normalize to [`PathKey::Index`], so `"0"` and `0`
/// address the same node no matter where the key came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathKey {
    Field(String),
    Index(usize),
}

impl PathKey {
    pub fn is_index(&self) -> bool {
        matches!(self, PathKey::Index(_))
    }

    pub fn as_field(&self) -> Option<&str> {
        match self {
            PathKey::Field(name) => Some(name),
            PathKey::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathKey::Index(i) => Some(*i),
            PathKey::Field(_) => None,
        }
    }

    /// The key as it appears inside an object map.
    pub fn to_field_name(&self) -> String {
        match self {
            PathKey::Field(name) => name.clone(),
            PathKey::Index(i) => i.to_string(),
        }
    }
}

impl From<&str> for PathKey {
    fn from(s: &str) -> Self {
        match s.parse::<usize>() {
            Ok(i) => PathKey::Index(i),
            Err(_) => PathKey::Field(s.to_string()),
        }
    }
}

impl From<String> for PathKey {
    fn from(s: String) -> Self {
        match s.parse::<usize>() {
            Ok(i) => PathKey::Index(i),
            Err(_) => PathKey::Field(s),
        }
    }
}

impl From<&String> for PathKey {
    fn from(s: &String) -> Self {
        PathKey::from(s.as_str())
    }
}

impl From<usize> for PathKey {
    fn from(i: usize) -> Self {
        PathKey::Index(i)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Field(name) => f.write_str(name),
            PathKey::Index(i) => write!(f, "{i}"),
        }
    }
}

impl Serialize for PathKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathKey::Field(name) => serializer.serialize_str(name),
            PathKey::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

impl<'de> Deserialize<'de> for PathKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl serde::de::Visitor<'_> for KeyVisitor {
            type Value = PathKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a field name or a sequence index")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<PathKey, E> {
                Ok(PathKey::from(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<PathKey, E> {
                Ok(PathKey::Index(v as usize))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<PathKey, E> {
                usize::try_from(v)
                    .map(PathKey::Index)
                    .map_err(|_| E::custom(format!("negative index {v}")))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

/// Location of one node inside a nested record. The root is the empty path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<PathKey>);

impl FieldPath {
    pub fn root() -> Self {
        FieldPath(Vec::new())
    }

    pub fn new(keys: impl Into<Vec<PathKey>>) -> Self {
        FieldPath(keys.into())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathKey>,
    {
        FieldPath(segments.into_iter().map(Into::into).collect())
    }

    /// Parses `tags.0.name` or `tags[0].name`.
    pub fn parse(s: &str) -> Self {
        let normalized = s.replace('[', ".").replace(']', "");
        FieldPath(
            normalized
                .split('.')
                .filter(|part| !part.is_empty())
                .map(PathKey::from)
                .collect(),
        )
    }

    pub fn push(&mut self, key: impl Into<PathKey>) {
        self.0.push(key.into());
    }

    pub fn pop(&mut self) -> Option<PathKey> {
        self.0.pop()
    }

    /// A new path with `key` appended.
    pub fn join(&self, key: impl Into<PathKey>) -> Self {
        let mut out = self.clone();
        out.push(key);
        out
    }

    pub fn parent(&self) -> Option<FieldPath> {
        match self.0.split_last() {
            Some((_, rest)) => Some(FieldPath(rest.to_vec())),
            None => None,
        }
    }

    pub fn last(&self) -> Option<&PathKey> {
        self.0.last()
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Drops sequence indices. Validator trees carry one entry per field type,
    /// not one per element.
    pub fn without_indices(&self) -> FieldPath {
        FieldPath(self.0.iter().filter(|k| !k.is_index()).cloned().collect())
    }

    /// Stable string form, usable as a map key outside of Rust.
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        FieldPath::parse(s)
    }
}

impl From<Vec<PathKey>> for FieldPath {
    fn from(keys: Vec<PathKey>) -> Self {
        FieldPath(keys)
    }
}

impl<const N: usize> From<[&str; N]> for FieldPath {
    fn from(parts: [&str; N]) -> Self {
        FieldPath::from_segments(parts)
    }
}

impl<'a> IntoIterator for &'a FieldPath {
    type Item = &'a PathKey;
    type IntoIter = std::slice::Iter<'a, PathKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
