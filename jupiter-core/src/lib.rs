pub mod config;
pub mod jupiter;
pub mod logging;

#[cfg(test)]
pub(crate) mod test_utils;

pub use jupiter::{
    Acknowledgement, DocumentConsumer, DocumentServer, DocumentSession, EditorPath, Jupiter,
    JupiterError, JupiterResult, Operation, Request, SiteId, TextDocument, VectorTime,
};
pub use logging::{init_logging, LogLevel};
