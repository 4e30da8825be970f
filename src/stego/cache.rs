// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Time-bounded cache driven by an injected [`Clock`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::stego::clock::Clock;

struct Entry<V> {
    value: V,
    inserted_at: u64,
}

/// Map whose entries disappear `ttl_secs` after insertion.
///
/// Expired entries are never returned; they are dropped lazily on access or
/// eagerly by [`TtlCache::purge_expired`].
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self { entries: HashMap::new(), ttl_secs, clock }
    }

    fn is_live(&self, entry: &Entry<V>, now: u64) -> bool {
        now.saturating_sub(entry.inserted_at) < self.ttl_secs
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.clock.now_secs();
        let live = self.entries.get(key).map(|e| self.is_live(e, now))?;
        if live {
            self.entries.get(key).map(|e| e.value.clone())
        } else {
            self.entries.remove(key);
            None
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        let inserted_at = self.clock.now_secs();
        self.entries.insert(key, Entry { value, inserted_at });
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_secs();
        let ttl = self.ttl_secs;
        let before = self.entries.len();
        self.entries.retain(|_, e| now.saturating_sub(e.inserted_at) < ttl);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entry count, including expired entries not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
