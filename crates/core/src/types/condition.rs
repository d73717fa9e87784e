//! Normalized condition variant selector.
//!
//! A cart line's identity is `(product_id, condition)`. The condition may
//! arrive from the API as a bare label (`"Good"`) or as a structured object
//! (`{"grade": "Good", "battery": 91}`), and the same object can be
//! serialized with its keys in any order. Comparing raw serializations would
//! therefore split one logical variant into several lines.
//!
//! [`Condition`] normalizes at construction: the value is reduced once to a
//! canonical fingerprint (recursively key-sorted JSON), and equality and
//! hashing use only that fingerprint.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A variant selector for a sellable unit (e.g. refurbishment grade).
///
/// Part of cart-line identity. Two conditions are equal iff their canonical
/// fingerprints are equal, regardless of JSON key order.
#[derive(Debug, Clone)]
pub struct Condition {
    value: Value,
    fingerprint: String,
}

impl Condition {
    /// Create a condition from a plain label such as `"Good"`.
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::from_value(Value::String(label.into()))
    }

    /// Create a condition from an arbitrary JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let mut fingerprint = String::new();
        write_canonical(&value, &mut fingerprint);
        Self { value, fingerprint }
    }

    /// The raw value as received from the wire.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.value
    }

    /// The label, if the condition is a bare string.
    #[must_use]
    pub fn as_label(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Canonical fingerprint (key-sorted JSON) computed at construction.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Render `value` as canonical JSON: object keys sorted recursively,
/// everything else in `serde_json`'s compact form.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(child) = map.get(*key) {
                    write_canonical(child, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Condition {}

impl std::hash::Hash for Condition {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_label() {
            Some(label) => f.write_str(label),
            None => f.write_str(&self.fingerprint),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

impl From<&str> for Condition {
    fn from(label: &str) -> Self {
        Self::label(label)
    }
}
