//! Star topology simulation driver
//!
//! Every link is a FIFO queue of encoded messages. Each step picks a random
//! client and either edits, delivers a batch in one direction or sends an
//! acknowledgement.

use anyhow::{anyhow, Result};
use jupiter_core::config::Config;
use jupiter_core::jupiter::wire::{decode_message, encode_message};
use jupiter_core::jupiter::{DocumentChecksum, WireFormat, WireMessage};
use jupiter_core::{DocumentServer, DocumentSession, EditorPath, Operation, SiteId, TextDocument};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace};

const HOST: SiteId = SiteId(0);
const EDITOR: &str = "simulation.txt";

/// Outcome of a run
#[derive(Debug)]
pub struct Report {
    pub edits: usize,
    pub messages: usize,
    /// Total encoded size of all delivered messages
    pub bytes: usize,
    pub text: String,
    pub checksum: DocumentChecksum,
    /// Clients whose final text differs from the host's
    pub diverged: Vec<SiteId>,
}

struct Client {
    session: DocumentSession<TextDocument>,
    remaining: usize,
    to_server: VecDeque<Vec<u8>>,
    to_client: VecDeque<Vec<u8>>,
}

pub struct Simulation {
    server: DocumentServer,
    clients: BTreeMap<SiteId, Client>,
    rng: StdRng,
    format: WireFormat,
    max_batch: usize,
    edits: usize,
    messages: usize,
    bytes: usize,
}

impl Simulation {
    pub fn new(config: &Config) -> Result<Self> {
        let editor = EditorPath::new(EDITOR);
        let document = TextDocument::new(editor.clone(), config.simulation.initial_text.clone());
        let mut server = DocumentServer::with_config(HOST, document, config.engine.clone())
            .with_identity("host");

        let mut clients = BTreeMap::new();
        for index in 1..=config.simulation.clients {
            let site = SiteId(u32::try_from(index)?);
            let snapshot = server.add_client(site)?;
            let document = TextDocument::new(editor.clone(), snapshot)
                .with_delete_validation(config.engine.validate_deletes);
            clients.insert(
                site,
                Client {
                    session: DocumentSession::with_config(document, site, HOST, &config.engine),
                    remaining: config.simulation.operations_per_client,
                    to_server: VecDeque::new(),
                    to_client: VecDeque::new(),
                },
            );
        }

        Ok(Simulation {
            server,
            clients,
            rng: StdRng::seed_from_u64(config.simulation.seed),
            format: config.engine.wire_format,
            max_batch: config.simulation.max_batch,
            edits: 0,
            messages: 0,
            bytes: 0,
        })
    }

    pub fn run(&mut self) -> Result<Report> {
        let sites: Vec<SiteId> = self.clients.keys().copied().collect();

        while self.clients.values().any(|c| c.remaining > 0) {
            let site = sites[self.rng.random_range(0..sites.len())];
            match self.rng.random_range(0..10) {
                0..=3 => self.client_edit(site)?,
                4..=5 => self.deliver_to_server(site)?,
                6..=7 => self.deliver_to_client(site)?,
                8 => self.client_acknowledge(site)?,
                _ => self.server_acknowledge()?,
            }
        }

        debug!(edits = self.edits, "All edits generated; draining links");
        self.drain(&sites)?;

        let checksum = self.server.checksum();
        let mut diverged = Vec::new();
        for (site, client) in &self.clients {
            let theirs = client.session.checksum()?;
            if theirs.as_ref() != Some(&checksum) {
                diverged.push(*site);
            }
        }

        Ok(Report {
            edits: self.edits,
            messages: self.messages,
            bytes: self.bytes,
            text: self.server.text().to_string(),
            checksum,
            diverged,
        })
    }

    fn client(&mut self, site: SiteId) -> Result<&mut Client> {
        self.clients.get_mut(&site).ok_or_else(|| anyhow!("unknown client {}", site))
    }

    fn encode(&self, message: &WireMessage) -> Result<Vec<u8>> {
        Ok(encode_message(message, self.format)?)
    }

    fn client_edit(&mut self, site: SiteId) -> Result<()> {
        if self.client(site)?.remaining == 0 {
            return Ok(());
        }
        let text = self.client(site)?.session.with_document(|d| d.text().to_string())?;
        let operation = random_edit(&mut self.rng, &text);

        let request = self.client(site)?.session.edit(operation)?;
        let bytes = self.encode(&WireMessage::Request(request))?;

        let client = self.client(site)?;
        client.remaining -= 1;
        client.to_server.push_back(bytes);
        self.edits += 1;
        Ok(())
    }

    fn client_acknowledge(&mut self, site: SiteId) -> Result<()> {
        let ack = self.client(site)?.session.acknowledgement()?;
        let bytes = self.encode(&WireMessage::Acknowledgement(ack))?;
        self.client(site)?.to_server.push_back(bytes);
        Ok(())
    }

    fn server_acknowledge(&mut self) -> Result<()> {
        for (site, ack) in self.server.pending_acknowledgements() {
            let bytes = self.encode(&WireMessage::Acknowledgement(ack))?;
            self.client(site)?.to_client.push_back(bytes);
        }
        Ok(())
    }

    fn batch_size(&mut self) -> usize {
        self.rng.random_range(1..=self.max_batch)
    }

    fn deliver_to_server(&mut self, site: SiteId) -> Result<()> {
        let batch = self.batch_size();
        for _ in 0..batch {
            let Some(bytes) = self.client(site)?.to_server.pop_front() else {
                break;
            };
            self.count(&bytes);

            match decode_message(&bytes, self.format)? {
                WireMessage::Request(request) => {
                    trace!(client = %site, vector = %request.vector, "Host receiving request");
                    for (target, relayed) in self.server.receive(&request)? {
                        let bytes = self.encode(&WireMessage::Request(relayed))?;
                        self.client(target)?.to_client.push_back(bytes);
                    }
                }
                WireMessage::Acknowledgement(ack) => self.server.receive_acknowledgement(&ack)?,
            }
        }
        Ok(())
    }

    fn deliver_to_client(&mut self, site: SiteId) -> Result<()> {
        let batch = self.batch_size();
        for _ in 0..batch {
            let Some(bytes) = self.client(site)?.to_client.pop_front() else {
                break;
            };
            self.count(&bytes);

            let message = decode_message(&bytes, self.format)?;
            let session = &self.client(site)?.session;
            match message {
                WireMessage::Request(request) => {
                    session.receive(&request)?;
                }
                WireMessage::Acknowledgement(ack) => session.receive_acknowledgement(&ack)?,
            }
        }
        Ok(())
    }

    fn drain(&mut self, sites: &[SiteId]) -> Result<()> {
        while self.clients.values().any(|c| !c.to_server.is_empty() || !c.to_client.is_empty()) {
            for site in sites {
                self.deliver_to_server(*site)?;
                self.deliver_to_client(*site)?;
            }
        }
        Ok(())
    }

    fn count(&mut self, bytes: &[u8]) {
        self.messages += 1;
        self.bytes += bytes.len();
    }
}

/// A random edit that is valid against `text`
fn random_edit(rng: &mut StdRng, text: &str) -> Operation {
    const WORDS: &[&str] = &["jupiter", " ", "ot", "é", "字", "\n"];

    let len = text.chars().count();
    if len == 0 || rng.random_bool(0.6) {
        let pos = rng.random_range(0..=len);
        return Operation::insert(pos, WORDS[rng.random_range(0..WORDS.len())]);
    }

    let pos = rng.random_range(0..len);
    let count = rng.random_range(1..=(len - pos).min(6));
    Operation::delete(pos, text.chars().skip(pos).take(count).collect::<String>())
}
