//! Core types for the turn journal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Version string written into saves and exports.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Content hash (SHA-256) used for export integrity checks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Compute hash from bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Hash(arr))
    }

    /// Short hex prefix, used when deriving slot ids.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[0..6])
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Identifier of a save slot in the storage backend.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(pub String);

impl SlotId {
    pub fn new(id: impl Into<String>) -> Self {
        SlotId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SlotId {
    fn from(s: &str) -> Self {
        SlotId(s.to_string())
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({})", self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The atomic versioned unit: knowledge base document plus message log.
///
/// Both halves always share one turn number. They are diffed separately but
/// never stored at different turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateBundle {
    /// Knowledge base document (arbitrary JSON tree).
    pub knowledge_base: Value,

    /// Ordered narrative message log.
    #[serde(default)]
    pub messages: Vec<Value>,
}

impl StateBundle {
    pub fn new(knowledge_base: Value, messages: Vec<Value>) -> Self {
        Self {
            knowledge_base,
            messages,
        }
    }

    /// Sentinel base used when a delta has no reachable keyframe.
    pub fn empty() -> Self {
        Self {
            knowledge_base: Value::Object(serde_json::Map::new()),
            messages: Vec::new(),
        }
    }

    /// Serialized JSON size, used by the keyframe size override.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for StateBundle {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_roundtrip() {
        let data = b"hello world";
        let hash = Hash::from_bytes(data);
        let hex = hash.to_hex();
        let parsed = Hash::from_hex(&hex).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_hash_short_hex() {
        let hash = Hash::from_bytes(b"test");
        assert_eq!(hash.short_hex().len(), 12);
        assert!(hash.to_hex().starts_with(&hash.short_hex()));
    }

    #[test]
    fn test_empty_bundle_is_sentinel() {
        let bundle = StateBundle::empty();
        assert_eq!(bundle.knowledge_base, json!({}));
        assert!(bundle.messages.is_empty());
        assert_eq!(bundle, StateBundle::default());
    }

    #[test]
    fn test_bundle_messages_default_on_deserialize() {
        let bundle: StateBundle =
            serde_json::from_value(json!({"knowledge_base": {"a": 1}})).unwrap();
        assert!(bundle.messages.is_empty());
        assert_eq!(bundle.knowledge_base["a"], 1);
    }

    #[test]
    fn test_encoded_len_grows_with_content() {
        let small = StateBundle::new(json!({}), vec![]);
        let large = StateBundle::new(json!({"lore": "x".repeat(100)}), vec![json!("hi")]);
        assert!(large.encoded_len() > small.encoded_len());
    }
}
