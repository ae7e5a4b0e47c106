/*
    engine.rs - Jupiter transformation engine for one (document, peer) pair

    State:
    - vector time (local generated, remote received)
    - outgoing log: locally generated operations the peer has not
      acknowledged yet, kept in the form the peer will see them
    - incoming log: remote requests applied here but not yet acknowledged
      back to the peer

    generate() records a local edit; receive() transforms a remote one
    against every outgoing entry the peer had not seen when it sent it.
    Both must be serialized by the caller (see document::DocumentSession).
*/

use super::errors::{JupiterError, JupiterResult};
use super::operation::{Operation, Priority};
use super::request::{Acknowledgement, EditorPath, Request, SiteId};
use super::vector_time::{CausalOrder, VectorTime};
use crate::config::EngineConfig;
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use tracing::{debug, error, trace, warn};

/// A locally generated operation awaiting acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEntry {
    /// Local operation count when it was generated
    pub sequence: u64,

    /// Site that created the edit (differs from the local site on relays)
    pub origin: SiteId,

    /// Current form of the operation, transformed by later remote requests
    pub operation: Operation,
}

/// Result of transforming a request, not yet committed to the engine
#[derive(Debug, Clone)]
pub(crate) struct PreparedReceive {
    operation: Operation,
    outgoing: VecDeque<OutgoingEntry>,
    incoming: u64,
    time: VectorTime,
}

impl PreparedReceive {
    /// The operation to apply to the local document
    pub(crate) fn operation(&self) -> &Operation {
        &self.operation
    }
}

/// One side of a Jupiter pair
#[derive(Debug, Clone)]
pub struct Jupiter {
    editor: EditorPath,
    local_site: SiteId,
    remote_site: SiteId,
    identity: String,
    time: VectorTime,
    outgoing: VecDeque<OutgoingEntry>,
    /// Remote sequence numbers applied but not yet acknowledged
    incoming: VecDeque<u64>,
    max_pending_outgoing: usize,
}

impl Jupiter {
    pub fn new(editor: EditorPath, local_site: SiteId, remote_site: SiteId) -> Self {
        Jupiter {
            editor,
            local_site,
            remote_site,
            identity: format!("site-{}", local_site),
            time: VectorTime::default(),
            outgoing: VecDeque::new(),
            incoming: VecDeque::new(),
            max_pending_outgoing: 0,
        }
    }

    /// Create an engine with limits taken from configuration
    pub fn from_config(
        editor: EditorPath,
        local_site: SiteId,
        remote_site: SiteId,
        config: &EngineConfig,
    ) -> Self {
        Self::new(editor, local_site, remote_site)
            .with_max_pending_outgoing(config.max_pending_outgoing)
    }

    /// Set the user identity stamped on generated requests
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Warn once the outgoing log grows past `limit` entries (0 disables)
    pub fn with_max_pending_outgoing(mut self, limit: usize) -> Self {
        self.max_pending_outgoing = limit;
        self
    }

    pub fn editor(&self) -> &EditorPath {
        &self.editor
    }

    pub fn site(&self) -> SiteId {
        self.local_site
    }

    pub fn remote_site(&self) -> SiteId {
        self.remote_site
    }

    pub fn vector_time(&self) -> VectorTime {
        self.time
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }

    pub fn incoming_len(&self) -> usize {
        self.incoming.len()
    }

    /// Remote sequence numbers the next acknowledgement will cover
    pub fn unacknowledged(&self) -> Option<RangeInclusive<u64>> {
        Some(*self.incoming.front()?..=*self.incoming.back()?)
    }

    /// Wrap a local edit into a request for the peer
    pub fn generate(&mut self, operation: Operation) -> Request {
        let origin = self.local_site;
        let originator = self.identity.clone();
        self.generate_relayed(operation, origin, originator)
    }

    /// Generate a request for an edit created at another site.
    ///
    /// Used by the star server to forward one client's edit to the others
    /// while keeping the origin used for tie-breaking.
    pub fn generate_relayed(
        &mut self,
        operation: Operation,
        origin: SiteId,
        originator: impl Into<String>,
    ) -> Request {
        let request = Request::new(
            origin,
            self.time,
            self.editor.clone(),
            originator,
            operation.clone(),
        );

        self.outgoing.push_back(OutgoingEntry { sequence: self.time.local(), origin, operation });
        self.time = self.time.increment_local();
        // our timestamp now tells the peer about everything we received
        self.incoming.clear();

        trace!(
            editor = %self.editor,
            site = %self.local_site,
            remote = %self.remote_site,
            vector = %request.vector,
            "Generated request"
        );

        if self.max_pending_outgoing > 0 && self.outgoing.len() > self.max_pending_outgoing {
            warn!(
                editor = %self.editor,
                remote = %self.remote_site,
                pending = self.outgoing.len(),
                limit = self.max_pending_outgoing,
                "Outgoing log exceeds limit; peer is not acknowledging"
            );
        }

        request
    }

    /// Transform a remote request into the operation to apply locally
    pub fn receive(&mut self, request: &Request) -> JupiterResult<Operation> {
        let prepared = self.prepare(request)?;
        Ok(self.commit(prepared))
    }

    /// Transform a request without touching engine state
    pub(crate) fn prepare(&self, request: &Request) -> JupiterResult<PreparedReceive> {
        if request.editor != self.editor {
            return Err(JupiterError::EditorMismatch {
                expected: self.editor.clone(),
                received: request.editor.clone(),
            });
        }

        self.check_preconditions(request.site, request.vector)?;

        if request.vector.mirrored().compare(&self.time) == CausalOrder::Concurrent {
            debug!(
                editor = %self.editor,
                local = %self.time,
                received = %request.vector,
                "Concurrent request; transforming"
            );
        }

        // entries the peer has seen are discarded, the rest are transformed against
        let mut outgoing: VecDeque<OutgoingEntry> = self
            .outgoing
            .iter()
            .filter(|entry| entry.sequence >= request.vector.remote())
            .cloned()
            .collect();

        let mut incoming_op = request.operation.clone();
        for entry in outgoing.iter_mut() {
            let priority = Priority::from_sites(request.site, entry.origin);
            let transformed = incoming_op.transform(&entry.operation, priority);
            entry.operation = entry.operation.transform(&incoming_op, priority.flip());
            incoming_op = transformed;
        }

        Ok(PreparedReceive {
            operation: incoming_op,
            outgoing,
            incoming: request.vector.local(),
            time: self.time.increment_remote(),
        })
    }

    /// Install the state computed by `prepare`
    pub(crate) fn commit(&mut self, prepared: PreparedReceive) -> Operation {
        let pruned = self.outgoing.len() - prepared.outgoing.len();
        self.outgoing = prepared.outgoing;
        self.incoming.push_back(prepared.incoming);
        self.time = prepared.time;

        trace!(
            editor = %self.editor,
            site = %self.local_site,
            vector = %self.time,
            pruned,
            "Received request"
        );

        prepared.operation
    }

    /// Timestamp-only message for the peer; clears the incoming log
    pub fn acknowledgement(&mut self) -> Acknowledgement {
        if let Some(covered) = self.unacknowledged() {
            trace!(
                editor = %self.editor,
                remote = %self.remote_site,
                first = covered.start(),
                last = covered.end(),
                "Acknowledging requests"
            );
        }
        self.incoming.clear();
        Acknowledgement { site: self.local_site, vector: self.time, editor: self.editor.clone() }
    }

    /// Prune outgoing entries the peer reports as applied.
    ///
    /// Acknowledgements are idempotent: a stale one prunes nothing.
    pub fn receive_acknowledgement(&mut self, ack: &Acknowledgement) -> JupiterResult<()> {
        if ack.editor != self.editor {
            return Err(JupiterError::EditorMismatch {
                expected: self.editor.clone(),
                received: ack.editor.clone(),
            });
        }
        if ack.vector.local() > self.time.remote() {
            return Err(self.causal_gap(
                ack.site,
                format!(
                    "acknowledgement covers {} remote operations but only {} were received",
                    ack.vector.local(),
                    self.time.remote()
                ),
            ));
        }
        if ack.vector.remote() > self.time.local() {
            return Err(self.causal_gap(
                ack.site,
                format!(
                    "acknowledgement covers {} local operations but only {} were generated",
                    ack.vector.remote(),
                    self.time.local()
                ),
            ));
        }

        let before = self.outgoing.len();
        self.outgoing.retain(|entry| entry.sequence >= ack.vector.remote());
        trace!(
            editor = %self.editor,
            pruned = before - self.outgoing.len(),
            "Received acknowledgement"
        );
        Ok(())
    }

    /// Return to the initial state after a resynchronization
    pub fn reset(&mut self) {
        debug!(editor = %self.editor, site = %self.local_site, vector = %self.time, "Resetting engine");
        self.time = VectorTime::default();
        self.outgoing.clear();
        self.incoming.clear();
    }

    /// Reject requests whose timestamp the local log cannot explain
    fn check_preconditions(&self, site: SiteId, vector: VectorTime) -> JupiterResult<()> {
        if vector.local() < self.time.remote() {
            warn!(
                editor = %self.editor,
                site = %site,
                received = %vector,
                local = %self.time,
                "Dropping duplicate request"
            );
            return Err(JupiterError::DuplicateRequest {
                site,
                received: vector.local(),
                expected: self.time.remote(),
            });
        }
        if vector.local() > self.time.remote() {
            return Err(self.causal_gap(
                site,
                format!(
                    "request is remote operation {} but only {} were received",
                    vector.local(),
                    self.time.remote()
                ),
            ));
        }
        if vector.remote() > self.time.local() {
            return Err(self.causal_gap(
                site,
                format!(
                    "request has seen {} local operations but only {} were generated",
                    vector.remote(),
                    self.time.local()
                ),
            ));
        }

        let oldest_kept = self.outgoing.front().map(|e| e.sequence).unwrap_or(self.time.local());
        if vector.remote() < oldest_kept {
            return Err(self.causal_gap(
                site,
                format!(
                    "request was generated after {} local operations but entries before {} are already pruned",
                    vector.remote(),
                    oldest_kept
                ),
            ));
        }

        Ok(())
    }

    fn causal_gap(&self, site: SiteId, reason: String) -> JupiterError {
        error!(editor = %self.editor, site = %site, local = %self.time, %reason, "Causal gap");
        JupiterError::CausalGap { site, reason }
    }
}
