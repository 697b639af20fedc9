use crate::broker::{Envelope, Response};
use search_core::protocol::{IndexSubmission, Reply, Request, INDEX_REQUEST};
use search_core::{ClientRegistry, DocId, IndexStore, SearchHit, MAX_HITS, NOT_FOUND};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Receiving end of the dispatch queue, shared by every handler in the pool.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<Envelope>>>;

/// Applies decoded requests to the shared store. Holds no per-session state.
#[derive(Clone)]
pub struct RequestHandler {
    store: Arc<IndexStore>,
    clients: Arc<ClientRegistry>,
}

impl RequestHandler {
    pub fn new(store: Arc<IndexStore>, clients: Arc<ClientRegistry>) -> Self {
        Self { store, clients }
    }

    pub fn handle(&self, frame: &str) -> Response {
        let request = match Request::decode(frame) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "malformed request");
                let reply = if frame.starts_with(INDEX_REQUEST) { Reply::IndexError } else { Reply::Error(e.to_string()) };
                return Response::Frame(reply.encode());
            }
        };
        let reply = match request {
            Request::Register => Reply::Registered(self.clients.register()),
            Request::Index(submission) => self.index(submission),
            Request::Search(terms) => Reply::Search(self.search(&terms)),
            Request::Quit => return Response::Close,
        };
        Response::Frame(reply.encode())
    }

    fn index(&self, submission: IndexSubmission) -> Reply {
        let IndexSubmission { client_id, path, counts } = submission;
        let owner = client_id.filter(|&id| {
            let issued = self.clients.is_issued(id);
            if !issued {
                warn!(client_id = id, path = %path, "index submission from unregistered client");
            }
            issued
        });
        let doc = self.store.register_document(&path);
        // owner only changes hands when the counts were accepted
        if let Err(e) = self.store.merge_frequencies(doc, &counts) {
            warn!(error = %e, path = %path, "index submission rejected");
            return Reply::IndexError;
        }
        self.store.set_owner(doc, owner);
        debug!(doc, path = %path, terms = counts.len(), "indexed");
        Reply::IndexOk
    }

    /// Sums frequencies per document over every term (a document matching any
    /// term is a hit) and returns the best `MAX_HITS`. Sums saturate at `u64::MAX`.
    pub fn search(&self, terms: &[String]) -> Vec<SearchHit> {
        let mut scores: HashMap<DocId, u64> = HashMap::new();
        for term in terms {
            for posting in self.store.lookup(term) {
                let score = scores.entry(posting.doc_id).or_insert(0);
                *score = score.saturating_add(posting.freq);
            }
        }
        rank(scores)
            .into_iter()
            .map(|(doc, freq)| {
                let path = self.store.resolve_path(doc).unwrap_or_else(|| {
                    warn!(doc, "document id has postings but no path");
                    NOT_FOUND.to_string()
                });
                SearchHit { owner: self.store.owner(doc), path, freq }
            })
            .collect()
    }
}

/// Highest aggregated frequency first, ties broken by ascending doc id.
pub fn rank(scores: HashMap<DocId, u64>) -> Vec<(DocId, u64)> {
    let mut ranked: Vec<(DocId, u64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(MAX_HITS);
    ranked
}

/// Pulls envelopes until the queue closes.
pub async fn run_worker(worker: usize, handler: RequestHandler, queue: SharedQueue) {
    debug!(worker, "handler started");
    loop {
        let next = { queue.lock().await.recv().await };
        let Some(Envelope { origin, frame, reply }) = next else { break };
        let response = handler.handle(&frame);
        if reply.send(response).is_err() {
            debug!(worker, origin, "origin went away before reply");
        }
    }
    debug!(worker, "handler stopped");
}
