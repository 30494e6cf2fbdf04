//! # Canonical Serialization: JCS Byte Production
//!
//! `CanonicalBytes` is the sole construction path for JSON payloads that are
//! stored in hash-chained tables (`audit_event.payload_json`,
//! `config_snapshot.content_json`, `risk_event.payload_json`).
//!
//! ## Security Invariant
//!
//! The inner buffer is private and only `CanonicalBytes::new()` fills it.
//! Two semantically equal payloads always produce the same bytes (sorted
//! keys, compact separators, RFC 8785 number formatting), so the chain hash
//! of an event depends on its content and never on map iteration order.
//!
//! Non-finite floats cannot be represented in JSON; `serde_json` turns them
//! into `null` before canonicalization.

use serde::Serialize;

use crate::error::CanonicalizationError;

/// UTF-8 bytes produced by JCS canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value
    /// cannot be represented as JSON (for example a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let text = serde_jcs::to_string(&value)?;
        Ok(Self(text.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The canonical text, as stored in `*_json` columns.
    pub fn as_str(&self) -> &str {
        // Built from a `String` in `new()`, so always valid UTF-8.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn into_string(self) -> String {
        String::from_utf8(self.0).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for CanonicalBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn sorts_keys_with_compact_separators() {
        let data = serde_json::json!({"z": 1, "m": "two", "a": [3, 2, 1]});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_str(), r#"{"a":[3,2,1],"m":"two","z":1}"#);
    }

    #[test]
    fn nested_objects_are_sorted() {
        let data = serde_json::json!({"outer": {"b": 2, "a": 1}, "list": []});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_str(), r#"{"list":[],"outer":{"a":1,"b":2}}"#);
    }

    #[test]
    fn floats_are_permitted() {
        let data = serde_json::json!({"value": 42.5, "threshold": 0.1});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_str(), r#"{"threshold":0.1,"value":42.5}"#);
    }

    #[test]
    fn non_finite_float_becomes_null() {
        let data = serde_json::json!({"value": f64::NAN});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_str(), r#"{"value":null}"#);
    }

    #[test]
    fn hash_map_order_does_not_leak() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for (k, v) in [("ticker", "ABC"), ("side", "BUY"), ("reason", "x")] {
            first.insert(k, v);
        }
        for (k, v) in [("reason", "x"), ("ticker", "ABC"), ("side", "BUY")] {
            second.insert(k, v);
        }
        assert_eq!(
            CanonicalBytes::new(&first).unwrap(),
            CanonicalBytes::new(&second).unwrap()
        );
    }

    #[test]
    fn display_matches_as_str() {
        let cb = CanonicalBytes::new(&serde_json::json!({"k": true})).unwrap();
        assert_eq!(cb.to_string(), cb.as_str());
        assert_eq!(cb.len(), cb.as_bytes().len());
        assert!(!cb.is_empty());
    }
}
