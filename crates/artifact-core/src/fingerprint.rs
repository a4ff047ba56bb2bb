//! Content fingerprints
//!
//! Provides [`Fingerprint`], a 32-byte Blake3 digest of an artifact's
//! data in canonical JSON form. Two entries with equal fingerprints hold
//! identical data.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte content digest (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Create from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest arbitrary bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest the canonical JSON encoding of a value
    ///
    /// Object keys are sorted at every level, so a typed struct and the
    /// equivalent JSON map produce the same fingerprint.
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn of_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let canonical = canonicalize(serde_json::to_value(value)?);
        let bytes = serde_json::to_vec(&canonical)?;
        Ok(Self::compute(&bytes))
    }

    /// First 16 hex chars, for logs
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Errors parsing a hex fingerprint
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// Not valid hex
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Wrong length
    #[error("invalid length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| FingerprintError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_json_equal_fingerprint() {
        let a = Fingerprint::of_json(&json!({ "a": 1, "b": [1, 2] })).unwrap();
        let b = Fingerprint::of_json(&json!({ "a": 1, "b": [1, 2] })).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn key_order_does_not_matter() {
        #[derive(Serialize)]
        struct Ordered {
            zeta: u8,
            alpha: u8,
        }
        let typed = Fingerprint::of_json(&Ordered { zeta: 1, alpha: 2 }).unwrap();
        let map = Fingerprint::of_json(&json!({ "alpha": 2, "zeta": 1 })).unwrap();
        assert_eq!(typed, map);
    }

    #[test]
    fn changed_json_changes_fingerprint() {
        let a = Fingerprint::of_json(&json!({ "a": 1 })).unwrap();
        let b = Fingerprint::of_json(&json!({ "a": 2 })).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn hex_round_trip() {
        let fp = Fingerprint::compute(b"payload");
        let parsed: Fingerprint = fp.to_string().parse().unwrap();
        assert_eq!(fp, parsed);
        assert_eq!(fp.short().len(), 16);
    }

    #[test]
    fn rejects_short_hex() {
        assert!(matches!(
            "abcd".parse::<Fingerprint>(),
            Err(FingerprintError::InvalidLength(2))
        ));
    }
}
