//! Canonical lookup keys shared by documents and order tables.
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Trimmed, upper-cased identifier with every whitespace character removed.
///
/// The empty key never matches a table record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Normalize a JSON scalar (strings, numbers, booleans); null is empty.
    pub fn from_value(value: &Value) -> NormalizedKey {
        match value {
            Value::Null => NormalizedKey::default(),
            Value::String(text) => normalize(text),
            other => normalize(&other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize(raw: &str) -> NormalizedKey {
    NormalizedKey(
        raw.chars()
            .filter(|ch| !ch.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect(),
    )
}
