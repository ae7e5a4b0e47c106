/*
    server.rs - Star topology relay for group sessions

    The host keeps the reference copy of a document and one Jupiter proxy
    per client. Every client talks only to the host, so vector times stay
    bilateral no matter how many clients edit the document.

    Flow for a client request:
    1. Transform through the sender's proxy
    2. Apply to the reference document
    3. Generate the result through every other client's proxy
*/

use super::checksum::DocumentChecksum;
use super::document::{DocumentConsumer, TextDocument};
use super::engine::Jupiter;
use super::errors::{JupiterError, JupiterResult};
use super::operation::Operation;
use super::request::{Acknowledgement, EditorPath, Request, SiteId};
use crate::config::EngineConfig;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Host side of one shared document
#[derive(Debug)]
pub struct DocumentServer {
    site: SiteId,
    identity: String,
    document: TextDocument,
    proxies: BTreeMap<SiteId, Jupiter>,
    config: EngineConfig,
}

impl DocumentServer {
    pub fn new(site: SiteId, document: TextDocument) -> Self {
        Self::with_config(site, document, EngineConfig::default())
    }

    pub fn with_config(site: SiteId, document: TextDocument, config: EngineConfig) -> Self {
        DocumentServer {
            site,
            identity: format!("site-{}", site),
            document: document.with_delete_validation(config.validate_deletes),
            proxies: BTreeMap::new(),
            config,
        }
    }

    /// Set the user identity stamped on the host's own edits
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn site(&self) -> SiteId {
        self.site
    }

    pub fn editor(&self) -> &EditorPath {
        self.document.document_identity()
    }

    pub fn text(&self) -> &str {
        self.document.text()
    }

    pub fn checksum(&self) -> DocumentChecksum {
        DocumentChecksum::of(self.document.text())
    }

    pub fn clients(&self) -> impl Iterator<Item = SiteId> + '_ {
        self.proxies.keys().copied()
    }

    /// Proxy engine for a client, for inspection
    pub fn proxy(&self, site: SiteId) -> Option<&Jupiter> {
        self.proxies.get(&site)
    }

    /// Attach a client; returns the text it must start from
    pub fn add_client(&mut self, site: SiteId) -> JupiterResult<String> {
        if site == self.site || self.proxies.contains_key(&site) {
            return Err(JupiterError::SiteConflict(site));
        }

        let proxy = Jupiter::from_config(self.editor().clone(), self.site, site, &self.config)
            .with_identity(self.identity.clone());
        self.proxies.insert(site, proxy);

        info!(editor = %self.editor(), client = %site, clients = self.proxies.len(), "Client joined");
        Ok(self.document.text().to_string())
    }

    pub fn remove_client(&mut self, site: SiteId) -> JupiterResult<()> {
        self.proxies.remove(&site).ok_or(JupiterError::UnknownSite(site))?;
        info!(editor = %self.editor(), client = %site, "Client left");
        Ok(())
    }

    /// Restart a client's proxy after the client resynchronized.
    ///
    /// Returns the snapshot the client must load.
    pub fn reset_client(&mut self, site: SiteId) -> JupiterResult<String> {
        let proxy = self.proxies.get_mut(&site).ok_or(JupiterError::UnknownSite(site))?;
        proxy.reset();
        Ok(self.document.text().to_string())
    }

    /// Handle a request from a client and fan it out to the others
    pub fn receive(&mut self, request: &Request) -> JupiterResult<Vec<(SiteId, Request)>> {
        let proxy = self
            .proxies
            .get_mut(&request.site)
            .ok_or(JupiterError::UnknownSite(request.site))?;

        let prepared = proxy.prepare(request)?;
        self.document.apply_locally(prepared.operation()).map_err(|e| {
            error!(editor = %request.editor, client = %request.site, error = %e, "Rejected operation");
            JupiterError::MalformedOperation(e.to_string())
        })?;
        let operation = proxy.commit(prepared);

        debug!(editor = %request.editor, client = %request.site, "Relaying operation");
        Ok(self.broadcast(operation, request.site, &request.originator))
    }

    /// Apply an edit made on the host and send it to every client
    pub fn edit(&mut self, operation: Operation) -> JupiterResult<Vec<(SiteId, Request)>> {
        self.document.apply_locally(&operation)?;
        let identity = self.identity.clone();
        Ok(self.broadcast(operation, self.site, &identity))
    }

    pub fn receive_acknowledgement(&mut self, ack: &Acknowledgement) -> JupiterResult<()> {
        self.proxies
            .get_mut(&ack.site)
            .ok_or(JupiterError::UnknownSite(ack.site))?
            .receive_acknowledgement(ack)
    }

    /// Acknowledgements for every client that has unacknowledged requests
    pub fn pending_acknowledgements(&mut self) -> Vec<(SiteId, Acknowledgement)> {
        self.proxies
            .iter_mut()
            .filter(|(_, proxy)| proxy.incoming_len() > 0)
            .map(|(site, proxy)| (*site, proxy.acknowledgement()))
            .collect()
    }

    fn broadcast(
        &mut self,
        operation: Operation,
        origin: SiteId,
        originator: &str,
    ) -> Vec<(SiteId, Request)> {
        self.proxies
            .iter_mut()
            .filter(|(site, _)| **site != origin)
            .map(|(site, proxy)| {
                (*site, proxy.generate_relayed(operation.clone(), origin, originator))
            })
            .collect()
    }
}
