//! Content addressing.
//!
//! Every content-addressed key (theme assets without a name, note
//! attachments) is derived from a single digest algorithm: BLAKE3, rendered
//! as lowercase hex. Hosts may plug in their own [`ContentAddresser`], but a
//! deployment must never mix algorithms under the same bucket or dedup stops
//! matching previously uploaded objects.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lowercase hex digest of some content.
///
/// Algorithm-agnostic: it is whatever the configured [`ContentAddresser`]
/// produced.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an already hex-encoded digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 10 hex characters, for log output.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(10);
        &self.0[..end]
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentHash").field(&self.0).finish()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pure digest function over byte content.
pub trait ContentAddresser: fmt::Debug + Send + Sync + 'static {
    fn digest(&self, content: &[u8]) -> ContentHash;
}

/// The default addresser: BLAKE3, 32 bytes, hex encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Addresser;

impl ContentAddresser for Blake3Addresser {
    fn digest(&self, content: &[u8]) -> ContentHash {
        ContentHash(hex::encode(blake3::hash(content).as_bytes()))
    }
}
