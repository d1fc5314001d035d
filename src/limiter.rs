//! Per-candidate usage limiting.
//!
//! Attempts are counted per participant identity in an injected store, so
//! the counter's lifetime policy is explicit instead of hiding in a global.
//! The in-memory store lives for the process and is never reset.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

/// Counts interview attempts per identity. Counts only increase.
pub trait AttemptStore: Send + Sync {
    /// Record one attempt and return the new total for this identity.
    fn increment(&self, identity: &str) -> u32;

    /// Current total for this identity.
    fn count(&self, identity: &str) -> u32;
}

/// Process-wide attempt store. No eviction, no persistence across restarts.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    counts: DashMap<String, u32>,
}

impl AttemptStore for MemoryAttemptStore {
    fn increment(&self, identity: &str) -> u32 {
        let mut entry = self.counts.entry(identity.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn count(&self, identity: &str) -> u32 {
        self.counts.get(identity).map(|c| *c).unwrap_or(0)
    }
}

/// Gates session continuation on the attempt count.
pub struct UsageLimiter {
    store: Arc<dyn AttemptStore>,
    limit: u32,
}

impl UsageLimiter {
    pub fn new(store: Arc<dyn AttemptStore>, limit: u32) -> Self {
        Self { store, limit }
    }

    /// Record an attempt and report whether the session may continue.
    ///
    /// Always increments, even when the attempt is rejected. Allowed while
    /// the post-increment count stays at or below the limit, so with a limit
    /// of 3 the fourth attempt is the first rejection.
    pub fn check_and_increment(&self, identity: &str) -> bool {
        let count = self.store.increment(identity);
        let allowed = count <= self.limit;
        if !allowed {
            warn!(identity, count, limit = self.limit, "usage limit exceeded");
        }
        allowed
    }
}
