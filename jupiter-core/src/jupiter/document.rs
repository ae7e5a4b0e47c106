/*
    document.rs - Document side of the engine

    The engine never touches text itself. A DocumentConsumer applies the
    transformed operations; DocumentSession pairs one consumer with one
    engine behind a mutex so generate/receive are serialized.
*/

use super::checksum::DocumentChecksum;
use super::engine::Jupiter;
use super::errors::{ApplyError, JupiterError, JupiterResult};
use super::operation::Operation;
use super::request::{Acknowledgement, EditorPath, Request, SiteId};
use super::vector_time::VectorTime;
use crate::config::EngineConfig;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

/// Capability the engine uses to reach the owned document
pub trait DocumentConsumer: Send {
    /// Apply a transformed operation. Must leave the document untouched on error.
    fn apply_locally(&mut self, operation: &Operation) -> Result<(), ApplyError>;

    /// Current length in chars
    fn document_length(&self) -> usize;

    fn document_identity(&self) -> &EditorPath;

    /// Checksum of the current contents, if the consumer can compute one
    fn checksum(&self) -> Option<DocumentChecksum> {
        None
    }
}

/// In-memory text buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    path: EditorPath,
    text: String,
    validate_deletes: bool,
}

impl TextDocument {
    pub fn new(path: EditorPath, text: impl Into<String>) -> Self {
        TextDocument { path, text: text.into(), validate_deletes: true }
    }

    /// Toggle checking recorded delete text against the buffer
    pub fn with_delete_validation(mut self, enabled: bool) -> Self {
        self.validate_deletes = enabled;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the contents, e.g. after a resynchronization
    pub fn replace(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

impl DocumentConsumer for TextDocument {
    fn apply_locally(&mut self, operation: &Operation) -> Result<(), ApplyError> {
        operation.apply_to(&mut self.text, self.validate_deletes)
    }

    fn document_length(&self) -> usize {
        self.text.chars().count()
    }

    fn document_identity(&self) -> &EditorPath {
        &self.path
    }

    fn checksum(&self) -> Option<DocumentChecksum> {
        Some(DocumentChecksum::of(&self.text))
    }
}

struct SessionState<C> {
    engine: Jupiter,
    consumer: C,
}

/// Engine plus document for one (document, peer) pair.
///
/// All entry points take `&self` and lock internally, so a session can be
/// shared between a network reader and an edit dispatcher via `Arc`.
pub struct DocumentSession<C: DocumentConsumer> {
    state: Mutex<SessionState<C>>,
}

fn handle_poison<T>(_err: PoisonError<T>) -> JupiterError {
    JupiterError::LockPoisoned
}

impl<C: DocumentConsumer> DocumentSession<C> {
    pub fn new(engine: Jupiter, consumer: C) -> Self {
        DocumentSession { state: Mutex::new(SessionState { engine, consumer }) }
    }

    /// Build the engine from configuration using the consumer's identity
    pub fn with_config(
        consumer: C,
        local_site: SiteId,
        remote_site: SiteId,
        config: &EngineConfig,
    ) -> Self {
        let editor = consumer.document_identity().clone();
        Self::new(Jupiter::from_config(editor, local_site, remote_site, config), consumer)
    }

    fn lock(&self) -> JupiterResult<MutexGuard<'_, SessionState<C>>> {
        self.state.lock().map_err(handle_poison)
    }

    /// Record an edit the editor has already applied to its document
    pub fn generate(&self, operation: Operation) -> JupiterResult<Request> {
        let mut state = self.lock()?;
        Ok(state.engine.generate(operation))
    }

    /// Apply a local edit to the document, then record it
    pub fn edit(&self, operation: Operation) -> JupiterResult<Request> {
        let mut state = self.lock()?;
        state.consumer.apply_locally(&operation)?;
        Ok(state.engine.generate(operation))
    }

    /// Transform and apply a remote request.
    ///
    /// All-or-nothing: on any error neither the engine nor the document
    /// has changed.
    pub fn receive(&self, request: &Request) -> JupiterResult<Operation> {
        let mut state = self.lock()?;
        let SessionState { engine, consumer } = &mut *state;

        let prepared = engine.prepare(request)?;
        let length = consumer.document_length();
        if let Err(e) = prepared.operation().check_bounds(length) {
            error!(
                editor = %engine.editor(),
                site = %request.site,
                error = %e,
                "Transformed operation does not fit the document"
            );
            return Err(JupiterError::MalformedOperation(e.to_string()));
        }

        consumer.apply_locally(prepared.operation()).map_err(|e| {
            error!(editor = %engine.editor(), site = %request.site, error = %e, "Rejected operation");
            JupiterError::MalformedOperation(e.to_string())
        })?;

        debug!(editor = %engine.editor(), site = %request.site, "Applied remote operation");
        Ok(engine.commit(prepared))
    }

    pub fn acknowledgement(&self) -> JupiterResult<Acknowledgement> {
        Ok(self.lock()?.engine.acknowledgement())
    }

    pub fn receive_acknowledgement(&self, ack: &Acknowledgement) -> JupiterResult<()> {
        self.lock()?.engine.receive_acknowledgement(ack)
    }

    /// Clear the engine back to its baseline (document contents are the
    /// session layer's business)
    pub fn reset(&self) -> JupiterResult<()> {
        self.lock()?.engine.reset();
        Ok(())
    }

    pub fn vector_time(&self) -> JupiterResult<VectorTime> {
        Ok(self.lock()?.engine.vector_time())
    }

    pub fn checksum(&self) -> JupiterResult<Option<DocumentChecksum>> {
        Ok(self.lock()?.consumer.checksum())
    }

    /// Run a closure with read access to the consumer
    pub fn with_document<R>(&self, f: impl FnOnce(&C) -> R) -> JupiterResult<R> {
        Ok(f(&self.lock()?.consumer))
    }

    /// Run a closure with mutable access to the consumer, e.g. to load a
    /// resynchronized snapshot after `reset`
    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut C) -> R) -> JupiterResult<R> {
        Ok(f(&mut self.lock()?.consumer))
    }

    /// Run a closure with read access to the engine
    pub fn with_engine<R>(&self, f: impl FnOnce(&Jupiter) -> R) -> JupiterResult<R> {
        Ok(f(&self.lock()?.engine))
    }
}
