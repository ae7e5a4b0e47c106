//! Document checksums for replica consistency checks
//!
//! Replicas exchange checksums out of band; a mismatch means the pair has
//! diverged and needs a full resynchronization.

use serde::{Deserialize, Serialize};

/// Length and blake3 digest of a document's text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentChecksum {
    /// Length in chars
    pub length: usize,

    /// Hex-encoded blake3 hash of the UTF-8 text
    pub hash: String,
}

impl DocumentChecksum {
    pub fn of(text: &str) -> Self {
        DocumentChecksum {
            length: text.chars().count(),
            hash: blake3::hash(text.as_bytes()).to_hex().to_string(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        *self == DocumentChecksum::of(text)
    }
}
