// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-bound memoization of loaded report batches.
//!
//! Contract: serve the cached value while it is younger than the TTL, else
//! recompute and replace. The single mutex excludes readers from an
//! in-progress replacement; the aggregation core itself never sees the
//! cache.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Default TTL, matching the upstream dashboard's refresh interval.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

struct Entry<T> {
    value: Arc<T>,
    inserted: Instant,
}

/// A single-entry TTL cache.
pub struct TtlCache<T> {
    ttl: Duration,
    entry: Mutex<Option<Entry<T>>>,
}

impl<T> TtlCache<T> {
    /// Creates a cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Returns the cached value if fresh, otherwise computes a new one with
    /// `load`, stores it, and returns it. A failed load leaves any stale
    /// entry in place untouched.
    pub fn get_or_load<E>(&self, load: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        let mut guard = self.entry.lock().expect("cache mutex poisoned");
        if let Some(entry) = guard.as_ref() {
            if entry.inserted.elapsed() < self.ttl {
                tracing::debug!("serving cached report batch");
                return Ok(Arc::clone(&entry.value));
            }
        }

        tracing::debug!("cache miss, loading fresh report batch");
        let value = Arc::new(load()?);
        *guard = Some(Entry {
            value: Arc::clone(&value),
            inserted: Instant::now(),
        });
        Ok(value)
    }

    /// Drops any cached value, forcing the next read to reload.
    pub fn invalidate(&self) {
        *self.entry.lock().expect("cache mutex poisoned") = None;
    }
}
