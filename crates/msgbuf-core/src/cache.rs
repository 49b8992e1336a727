//! Time-windowed memoization for expensive bot calls.
//!
//! Platforms that require an upload round-trip before a file can be
//! referenced use a [`ShelfCache`] to avoid re-uploading the same payload
//! within a shelf-life window (24 hours by default). Entries are keyed by
//! the call's JSON argument object; stale entries are pruned on access.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiResult;

struct Entry {
    key: Value,
    stored_at: Instant,
    value: Value,
}

/// A memoization cache whose entries expire after a configurable shelf life.
pub struct ShelfCache {
    shelf_life: Duration,
    entries: Mutex<Vec<Entry>>,
}

impl ShelfCache {
    /// Default shelf life: 24 hours.
    pub const DEFAULT_SHELF_LIFE: Duration = Duration::from_secs(86_400);

    /// Creates a cache with the given shelf life.
    pub fn new(shelf_life: Duration) -> Self {
        Self {
            shelf_life,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Number of live entries (stale ones are pruned first).
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        Self::prune(&mut entries, self.shelf_life);
        entries.len()
    }

    /// Returns true if the cache holds no live entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a live entry by key.
    pub fn lookup(&self, key: &Value) -> Option<Value> {
        let mut entries = self.entries.lock();
        Self::prune(&mut entries, self.shelf_life);
        entries
            .iter()
            .find(|entry| &entry.key == key)
            .map(|entry| entry.value.clone())
    }

    /// Stores a value under the given key.
    pub fn store(&self, key: Value, value: Value) {
        self.entries.lock().push(Entry {
            key,
            stored_at: Instant::now(),
            value,
        });
    }

    /// Returns the cached value for `key`, or runs `call` and caches its
    /// result. Failures are returned as-is and never cached.
    ///
    /// The lock is never held across the awaited call.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: Value, call: F) -> ApiResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<Value>>,
    {
        if let Some(hit) = self.lookup(&key) {
            debug!("shelf cache hit");
            return Ok(hit);
        }
        let value = call().await?;
        self.store(key, value.clone());
        Ok(value)
    }

    fn prune(entries: &mut Vec<Entry>, shelf_life: Duration) {
        let now = Instant::now();
        entries.retain(|entry| now.duration_since(entry.stored_at) <= shelf_life);
    }
}

impl Default for ShelfCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SHELF_LIFE)
    }
}

// =============================================================================
// Tests
// =============================================================================
