//! Cancellable chew timers
//!
//! Each World keeps one table of pending finalize tasks keyed by collectible
//! id. Scheduling a new task for a key aborts whatever was there, so a
//! superseding claim always replaces the old timer instead of racing it.

use shared::CollectibleId;
use std::collections::HashMap;
use tokio::task::AbortHandle;

#[derive(Debug, Default)]
pub struct ChewTimers {
    tasks: HashMap<CollectibleId, AbortHandle>,
}

impl ChewTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, id: CollectibleId, handle: AbortHandle) {
        if let Some(previous) = self.tasks.insert(id, handle) {
            previous.abort();
        }
    }

    /// Aborts the pending task for `id`; returns false if none was scheduled
    pub fn cancel(&mut self, id: &str) -> bool {
        match self.tasks.remove(id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.tasks.len();
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
        count
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
