/*
    request.rs - Transformation request envelope

    A request says: apply this operation, generated while the sender's
    vector time was `vector`. The origin site is the site that created the
    edit; relays keep it intact so ties resolve the same way everywhere.
*/

use super::operation::Operation;
use super::vector_time::VectorTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a participant endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u32);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Path of the shared document an engine belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorPath(String);

impl EditorPath {
    pub fn new(path: impl Into<String>) -> Self {
        EditorPath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EditorPath {
    fn from(path: &str) -> Self {
        EditorPath::new(path)
    }
}

/// An operation together with the causal context it was generated in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    /// Site that created the edit
    pub site: SiteId,

    /// Sender's vector time at generation
    pub vector: VectorTime,

    /// Document the operation targets
    pub editor: EditorPath,

    /// User identity of whoever typed the edit (e.g. "alice@example.org")
    pub originator: String,

    #[serde(rename = "op")]
    pub operation: Operation,
}

impl Request {
    pub fn new(
        site: SiteId,
        vector: VectorTime,
        editor: EditorPath,
        originator: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Request { site, vector, editor, originator: originator.into(), operation }
    }
}

/// Timestamp-only message telling the peer how much of its history we have
/// applied, so it can prune its outgoing log without waiting for an edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub site: SiteId,
    pub vector: VectorTime,
    pub editor: EditorPath,
}
