//! Shared in-memory inverted index.
//!
//! Two exclusion domains: the document table (paths, ids, owners) and the
//! term index (postings). No method holds both locks except `reset`, which
//! always takes them in the same order.

use crate::{ClientId, DocId, Posting, StoreError, TermCounts};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct DocumentTable {
    by_path: HashMap<String, DocId>,
    by_id: HashMap<DocId, String>,
    owners: HashMap<DocId, ClientId>,
    last_id: DocId,
}

#[derive(Default)]
pub struct IndexStore {
    docs: RwLock<DocumentTable>,
    // term -> (doc id -> cumulative frequency)
    terms: RwLock<HashMap<String, HashMap<DocId, u64>>>,
}

impl IndexStore {
    pub fn new() -> Self { Self::default() }

    /// Returns the id for `path`, allocating the next one the first time the path is seen.
    pub fn register_document(&self, path: &str) -> DocId {
        if let Some(&id) = self.docs.read().by_path.get(path) {
            return id;
        }
        let mut docs = self.docs.write();
        // another writer may have won the race between the two locks
        if let Some(&id) = docs.by_path.get(path) {
            return id;
        }
        docs.last_id += 1;
        let id = docs.last_id;
        docs.by_path.insert(path.to_string(), id);
        docs.by_id.insert(id, path.to_string());
        id
    }

    /// Records `owner` for `id`; `None` marks the document as owned by nobody known.
    pub fn set_owner(&self, id: DocId, owner: Option<ClientId>) {
        let mut docs = self.docs.write();
        match owner {
            Some(client) => { docs.owners.insert(id, client); }
            None => { docs.owners.remove(&id); }
        }
    }

    pub fn owner(&self, id: DocId) -> Option<ClientId> {
        self.docs.read().owners.get(&id).copied()
    }

    pub fn resolve_path(&self, id: DocId) -> Option<String> {
        self.docs.read().by_id.get(&id).cloned()
    }

    /// Adds every count in `counts` to the posting of (`term`, `id`).
    ///
    /// Either every count is applied or, if any sum would overflow, none is.
    pub fn merge_frequencies(&self, id: DocId, counts: &TermCounts) -> Result<(), StoreError> {
        let mut terms = self.terms.write();
        for (term, &count) in counts {
            let current = terms.get(term).and_then(|plist| plist.get(&id)).copied().unwrap_or(0);
            if current.checked_add(count).is_none() {
                return Err(StoreError::FrequencyOverflow { term: term.clone(), doc: id });
            }
        }
        for (term, &count) in counts {
            *terms.entry(term.clone()).or_default().entry(id).or_insert(0) += count;
        }
        Ok(())
    }

    /// Snapshot of the posting list for `term`, ordered by doc id.
    pub fn lookup(&self, term: &str) -> Vec<Posting> {
        let terms = self.terms.read();
        let mut postings: Vec<Posting> = match terms.get(term) {
            Some(plist) => plist.iter().map(|(&doc_id, &freq)| Posting { doc_id, freq }).collect(),
            None => return Vec::new(),
        };
        drop(terms);
        postings.sort_by_key(|p| p.doc_id);
        postings
    }

    pub fn document_count(&self) -> usize { self.docs.read().by_path.len() }

    pub fn term_count(&self) -> usize { self.terms.read().len() }

    /// Drops every document, posting and owner and restarts id allocation.
    pub fn reset(&self) {
        let mut docs = self.docs.write();
        let mut terms = self.terms.write();
        *docs = DocumentTable::default();
        terms.clear();
        tracing::info!("index store cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn counts(pairs: &[(&str, u64)]) -> TermCounts {
        pairs.iter().map(|(t, c)| (t.to_string(), *c)).collect()
    }

    #[test]
    fn registration_is_idempotent() {
        let store = IndexStore::new();
        let a = store.register_document("/data/a.txt");
        let b = store.register_document("/data/b.txt");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(store.register_document("/data/a.txt"), a);
        assert_eq!(store.document_count(), 2);
        assert_eq!(store.resolve_path(b).as_deref(), Some("/data/b.txt"));
    }

    #[test]
    fn concurrent_registration_allocates_one_id() {
        let store = Arc::new(IndexStore::new());
        let ids: Vec<DocId> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.register_document("/shared/path"))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        assert!(ids.iter().all(|&id| id == ids[0]));
        assert_eq!(store.document_count(), 1);
    }

    #[test]
    fn merge_accumulates_across_submissions() {
        let store = IndexStore::new();
        let doc = store.register_document("/a");
        store.merge_frequencies(doc, &counts(&[("alpha", 2), ("beta", 1)])).unwrap();
        store.merge_frequencies(doc, &counts(&[("alpha", 3)])).unwrap();
        assert_eq!(store.lookup("alpha"), vec![Posting { doc_id: doc, freq: 5 }]);
        assert_eq!(store.lookup("beta"), vec![Posting { doc_id: doc, freq: 1 }]);
        assert!(store.lookup("gamma").is_empty());
    }

    #[test]
    fn interleaved_merges_sum_to_total() {
        let store = Arc::new(IndexStore::new());
        let docs: Vec<DocId> = (0..4).map(|i| store.register_document(&format!("/d{i}"))).collect();
        let handles: Vec<_> = (0..8u64)
            .map(|n| {
                let store = Arc::clone(&store);
                let docs = docs.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        for &d in &docs {
                            store.merge_frequencies(d, &counts(&[("term", n + 1)])).unwrap();
                        }
                    }
                })
            })
            .collect();
        for h in handles { h.join().unwrap(); }
        // sum of 1..=8 applied 100 times
        let postings = store.lookup("term");
        assert_eq!(postings.len(), 4);
        assert!(postings.iter().all(|p| p.freq == 3600));
    }

    #[test]
    fn overflowing_merge_applies_nothing() {
        let store = IndexStore::new();
        let doc = store.register_document("/a");
        store.merge_frequencies(doc, &counts(&[("alpha", u64::MAX), ("beta", 1)])).unwrap();
        let err = store.merge_frequencies(doc, &counts(&[("beta", 5), ("alpha", 1)])).unwrap_err();
        assert_eq!(err, StoreError::FrequencyOverflow { term: "alpha".into(), doc });
        assert_eq!(store.lookup("alpha")[0].freq, u64::MAX);
        assert_eq!(store.lookup("beta")[0].freq, 1);
    }

    #[test]
    fn lookup_returns_a_copy() {
        let store = IndexStore::new();
        let doc = store.register_document("/a");
        store.merge_frequencies(doc, &counts(&[("alpha", 2)])).unwrap();
        let mut snapshot = store.lookup("alpha");
        snapshot[0].freq = 999;
        snapshot.clear();
        assert_eq!(store.lookup("alpha")[0].freq, 2);
    }

    #[test]
    fn owner_defaults_to_unknown_and_last_write_wins() {
        let store = IndexStore::new();
        let doc = store.register_document("/a");
        assert_eq!(store.owner(doc), None);
        store.set_owner(doc, Some(3));
        store.set_owner(doc, Some(7));
        assert_eq!(store.owner(doc), Some(7));
        store.set_owner(doc, None);
        assert_eq!(store.owner(doc), None);
        assert_eq!(store.resolve_path(42), None);
    }

    #[test]
    fn reset_clears_everything() {
        let store = IndexStore::new();
        let doc = store.register_document("/a");
        store.set_owner(doc, Some(1));
        store.merge_frequencies(doc, &counts(&[("alpha", 2)])).unwrap();
        store.reset();
        assert_eq!(store.document_count(), 0);
        assert_eq!(store.term_count(), 0);
        assert_eq!(store.owner(doc), None);
        assert_eq!(store.register_document("/b"), 1);
    }
}
