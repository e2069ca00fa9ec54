//! Entity digests.
//!
//! The digest of an entity's canonical key is the base name of its published
//! file. It depends on nothing but the key bytes, so a restarted gateway keeps
//! writing to the same files.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::entity::EntityKey;

/// Number of hash bytes kept in a digest.
pub const DIGEST_BYTES: usize = 16;

/// Length of the hex rendering of a digest.
pub const DIGEST_HEX_LEN: usize = DIGEST_BYTES * 2;

/// Fixed-width lowercase hex digest naming an entity's published file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityDigest(String);

impl EntityDigest {
    /// Digest of an entity key.
    #[must_use]
    pub fn of(key: &EntityKey) -> Self {
        Self::of_canonical(&key.canonical())
    }

    /// Digest of an already canonical key string.
    #[must_use]
    pub fn of_canonical(canonical: &str) -> Self {
        let mut h = Hasher::new();
        h.update(canonical.as_bytes());
        let hash = h.finalize();
        Self(hex::encode(&hash.as_bytes()[..DIGEST_BYTES]))
    }

    /// Accept a digest read back from a file name.
    ///
    /// Returns `None` unless `s` is exactly [`DIGEST_HEX_LEN`] lowercase hex
    /// characters.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let well_formed = s.len() == DIGEST_HEX_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(s.to_string()))
    }

    /// The hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
