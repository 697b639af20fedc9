use crate::ClientId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out client ids. Ids start at 1 and are never reused until `reset`.
#[derive(Default)]
pub struct ClientRegistry {
    last: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&self) -> ClientId {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_issued(&self, id: ClientId) -> bool {
        id != 0 && id <= self.last.load(Ordering::SeqCst)
    }

    pub fn reset(&self) { self.last.store(0, Ordering::SeqCst); }
}
