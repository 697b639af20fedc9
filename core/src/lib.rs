pub mod error;
pub mod frame;
pub mod protocol;
pub mod registry;
pub mod store;
pub mod tokenizer;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use error::{ProtocolError, StoreError};
pub use registry::ClientRegistry;
pub use store::IndexStore;

pub type DocId = u64;
pub type ClientId = u64;

/// Term -> occurrence count for one document submission.
pub type TermCounts = HashMap<String, u64>;

/// Path reported for a document id that has no entry in the document table.
pub const NOT_FOUND: &str = "UNKNOWN_DOCUMENT";

/// Wire representation of a document with no known owner.
pub const UNKNOWN_OWNER: i64 = -1;

/// Maximum number of hits returned by a search.
pub const MAX_HITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub freq: u64,
}

/// One ranked search result as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub owner: Option<ClientId>,
    pub path: String,
    pub freq: u64,
}
