/*
    errors.rs - Error types for the transformation engine

    Covers:
    - Causality violations between the two ends of a Jupiter pair
    - Duplicate delivery of already incorporated requests
    - Operations that cannot be applied to the document
    - Wire encoding failures
*/

use super::request::{EditorPath, SiteId};
use thiserror::Error;

/// Errors raised by the Jupiter engine and the layers wrapped around it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JupiterError {
    /// The request's timestamp cannot be reconciled with the local log.
    /// The pair must be resynchronized.
    #[error("Causal gap from site {site}: {reason}")]
    CausalGap { site: SiteId, reason: String },

    /// The request was already incorporated
    #[error("Duplicate request from site {site}: remote count {received} already at {expected}")]
    DuplicateRequest { site: SiteId, received: u64, expected: u64 },

    /// The operation is inconsistent with the document it targets
    #[error("Malformed operation: {0}")]
    MalformedOperation(String),

    /// Wire payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The document consumer refused the operation
    #[error("Apply failed: {0}")]
    Apply(#[from] ApplyError),

    /// No engine exists for this site
    #[error("Unknown site: {0}")]
    UnknownSite(SiteId),

    /// A client with this site is already attached
    #[error("Site already registered: {0}")]
    SiteConflict(SiteId),

    /// The request targets another document
    #[error("Request for {received} delivered to engine for {expected}")]
    EditorMismatch { expected: EditorPath, received: EditorPath },

    #[error("Lock poisoned: a thread panicked while holding the session lock")]
    LockPoisoned,
}

impl JupiterError {
    /// Whether the error invalidates the whole (document, peer) pair.
    ///
    /// Fatal errors must be answered with a full resynchronization by the
    /// session layer; the engine never recovers from them on its own.
    pub fn is_fatal(&self) -> bool {
        matches!(self, JupiterError::CausalGap { .. } | JupiterError::LockPoisoned)
    }

    /// Whether the offending message can simply be dropped
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            JupiterError::DuplicateRequest { .. } | JupiterError::Serialization(_)
        )
    }
}

/// Result type for engine operations
pub type JupiterResult<T> = Result<T, JupiterError>;

/// Errors a document consumer reports when an operation does not fit its text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("Position {position} out of range for document of length {length}")]
    OutOfRange { position: usize, length: usize },

    #[error("Delete at {position} expected {expected:?} but document holds {found:?}")]
    TextMismatch { position: usize, expected: String, found: String },
}

impl From<bincode::Error> for JupiterError {
    fn from(err: bincode::Error) -> Self {
        JupiterError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for JupiterError {
    fn from(err: serde_json::Error) -> Self {
        JupiterError::Serialization(err.to_string())
    }
}
