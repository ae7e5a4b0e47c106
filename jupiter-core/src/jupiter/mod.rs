/*
    Jupiter - operational transformation for concurrent text editing

    Keeps the two ends of a (document, peer) pair convergent by rewriting
    concurrent edits instead of locking.
*/

pub mod checksum;
pub mod document;
pub mod engine;
pub mod errors;
pub mod operation;
pub mod request;
pub mod server;
pub mod vector_time;
pub mod wire;

#[cfg(test)]
mod tests;

pub use checksum::DocumentChecksum;
pub use document::{DocumentConsumer, DocumentSession, TextDocument};
pub use engine::{Jupiter, OutgoingEntry};
pub use errors::{ApplyError, JupiterError, JupiterResult};
pub use operation::{Operation, Priority};
pub use request::{Acknowledgement, EditorPath, Request, SiteId};
pub use server::DocumentServer;
pub use vector_time::{CausalOrder, VectorTime};
pub use wire::{WireFormat, WireMessage};
