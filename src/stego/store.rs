// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Key metadata store contract.
//!
//! The watermarking pipeline never persists keys itself. Hosts that need to
//! remember which documents were secured implement [`KeyStore`];
//! [`MemoryKeyStore`] is a thread-safe in-memory implementation and
//! [`CachedKeyStore`] fronts any store with a TTL cache for lookups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::stego::cache::TtlCache;
use crate::stego::clock::Clock;
use crate::stego::crypto::DocumentKey;
use crate::stego::error::{Result, StegoError};

const SECS_PER_DAY: u64 = 24 * 3600;

/// Default number of idle days before [`KeyStore::expire`] drops a record.
pub const DEFAULT_EXPIRY_DAYS: u64 = 30;

/// Stored metadata for one secured document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Hex SHA-256 of the document.
    pub document_hash: String,
    /// Base64url document key.
    pub document_key: String,
    pub created_at: u64,
    pub last_accessed: u64,
    pub access_count: u64,
    pub created_by: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl KeyRecord {
    /// A fresh record; timestamps are filled in by the store on `put`.
    pub fn new(document_hash: impl Into<String>, key: &DocumentKey, created_by: impl Into<String>) -> Self {
        Self {
            document_hash: document_hash.into(),
            document_key: key.to_base64(),
            created_at: 0,
            last_accessed: 0,
            access_count: 0,
            created_by: created_by.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Decode the stored key.
    pub fn key(&self) -> Result<DocumentKey> {
        DocumentKey::from_base64(&self.document_key)
    }
}

/// Persistence for [`KeyRecord`]s, keyed by document hash.
pub trait KeyStore: Send + Sync {
    /// Insert or replace. A new record counts as accessed once; replacing
    /// keeps the first `created_at` and bumps the count.
    fn put(&self, record: KeyRecord) -> Result<()>;

    /// Look up a record, bumping its access statistics.
    fn get(&self, document_hash: &str) -> Result<Option<KeyRecord>>;

    /// All records, newest first.
    fn list(&self) -> Result<Vec<KeyRecord>>;

    /// Remove a record; returns whether it existed.
    fn delete(&self, document_hash: &str) -> Result<bool>;

    /// Drop records not accessed within `days`; returns how many.
    fn expire(&self, days: u64) -> Result<usize>;
}

fn poisoned<T>(_: T) -> StegoError {
    StegoError::Store("lock poisoned".into())
}

/// In-memory [`KeyStore`]. Thread-safe via `RwLock`.
pub struct MemoryKeyStore {
    records: RwLock<HashMap<String, KeyRecord>>,
    clock: Arc<dyn Clock>,
}

impl MemoryKeyStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { records: RwLock::new(HashMap::new()), clock }
    }

    /// Serialize every record as a JSON backup.
    pub fn export_json(&self) -> Result<String> {
        let records = self.list()?;
        serde_json::to_string_pretty(&records).map_err(|e| StegoError::Store(e.to_string()))
    }

    /// Merge records from a JSON backup; returns how many were imported.
    ///
    /// Records with undecodable keys are rejected before anything is written.
    pub fn import_json(&self, json: &str) -> Result<usize> {
        let records: Vec<KeyRecord> =
            serde_json::from_str(json).map_err(|e| StegoError::Store(e.to_string()))?;
        for r in &records {
            r.key()?;
        }
        let mut map = self.records.write().map_err(poisoned)?;
        let count = records.len();
        for r in records {
            map.insert(r.document_hash.clone(), r);
        }
        info!("imported {count} key records");
        Ok(count)
    }
}

impl KeyStore for MemoryKeyStore {
    fn put(&self, mut record: KeyRecord) -> Result<()> {
        record.key()?;
        let now = self.clock.now_secs();
        let mut map = self.records.write().map_err(poisoned)?;
        match map.get(&record.document_hash) {
            Some(existing) => {
                record.created_at = existing.created_at;
                record.access_count = existing.access_count + 1;
            }
            None => {
                record.created_at = now;
                record.access_count = 1;
            }
        }
        record.last_accessed = now;
        debug!("stored key record for {}", short(&record.document_hash));
        map.insert(record.document_hash.clone(), record);
        Ok(())
    }

    fn get(&self, document_hash: &str) -> Result<Option<KeyRecord>> {
        let now = self.clock.now_secs();
        let mut map = self.records.write().map_err(poisoned)?;
        Ok(map.get_mut(document_hash).map(|r| {
            r.access_count += 1;
            r.last_accessed = now;
            r.clone()
        }))
    }

    fn list(&self) -> Result<Vec<KeyRecord>> {
        let map = self.records.read().map_err(poisoned)?;
        let mut all: Vec<KeyRecord> = map.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then_with(|| a.document_hash.cmp(&b.document_hash))
        });
        Ok(all)
    }

    fn delete(&self, document_hash: &str) -> Result<bool> {
        let mut map = self.records.write().map_err(poisoned)?;
        Ok(map.remove(document_hash).is_some())
    }

    fn expire(&self, days: u64) -> Result<usize> {
        let cutoff = self.clock.now_secs().saturating_sub(days.saturating_mul(SECS_PER_DAY));
        let mut map = self.records.write().map_err(poisoned)?;
        let before = map.len();
        map.retain(|_, r| r.last_accessed >= cutoff);
        let removed = before - map.len();
        if removed > 0 {
            info!("expired {removed} key records idle for more than {days} days");
        }
        Ok(removed)
    }
}

/// A [`KeyStore`] with a TTL cache in front of `get`.
///
/// Cache hits skip the inner store, so its access statistics only move on
/// misses.
pub struct CachedKeyStore<S> {
    inner: S,
    cache: Mutex<TtlCache<String, KeyRecord>>,
}

impl<S: KeyStore> CachedKeyStore<S> {
    pub fn new(inner: S, ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self { inner, cache: Mutex::new(TtlCache::new(ttl_secs, clock)) }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn cache(&self) -> Result<std::sync::MutexGuard<'_, TtlCache<String, KeyRecord>>> {
        self.cache.lock().map_err(poisoned)
    }
}

impl<S: KeyStore> KeyStore for CachedKeyStore<S> {
    fn put(&self, record: KeyRecord) -> Result<()> {
        self.cache()?.remove(&record.document_hash);
        self.inner.put(record)
    }

    fn get(&self, document_hash: &str) -> Result<Option<KeyRecord>> {
        if let Some(hit) = self.cache()?.get(&document_hash.to_string()) {
            return Ok(Some(hit));
        }
        let found = self.inner.get(document_hash)?;
        if let Some(record) = &found {
            self.cache()?.insert(document_hash.to_string(), record.clone());
        }
        Ok(found)
    }

    fn list(&self) -> Result<Vec<KeyRecord>> {
        self.inner.list()
    }

    fn delete(&self, document_hash: &str) -> Result<bool> {
        self.cache()?.remove(&document_hash.to_string());
        self.inner.delete(document_hash)
    }

    fn expire(&self, days: u64) -> Result<usize> {
        self.cache()?.clear();
        self.inner.expire(days)
    }
}

fn short(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stego::clock::ManualClock;

    const T0: u64 = 1_760_000_000;

    fn record(hash: &str) -> KeyRecord {
        KeyRecord::new(hash, &DocumentKey::from_bytes(&[9; 32]).unwrap(), "tester")
    }

    #[test]
    fn put_get_bumps_access() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = MemoryKeyStore::new(clock.clone());
        store.put(record("aa")).unwrap();
        clock.advance(100);
        let r = store.get("aa").unwrap().unwrap();
        assert_eq!(r.created_at, T0);
        assert_eq!(r.last_accessed, T0 + 100);
        assert_eq!(r.access_count, 2);
        assert_eq!(r.key().unwrap().as_bytes(), &[9; 32]);
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn new_record_starts_with_one_access() {
        let store = MemoryKeyStore::new(Arc::new(ManualClock::new(T0)));
        store.put(record("aa")).unwrap();
        let r = &store.list().unwrap()[0];
        assert_eq!(r.access_count, 1);
        assert_eq!(r.last_accessed, T0);

        store.put(record("aa")).unwrap();
        assert_eq!(store.list().unwrap()[0].access_count, 2);
    }

    #[test]
    fn replace_keeps_created_at() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = MemoryKeyStore::new(clock.clone());
        store.put(record("aa")).unwrap();
        clock.advance(50);
        store.put(record("aa").with_metadata(serde_json::json!({"note": "v2"}))).unwrap();
        let r = store.get("aa").unwrap().unwrap();
        assert_eq!(r.created_at, T0);
        assert_eq!(r.metadata["note"], "v2");
    }

    #[test]
    fn bad_key_rejected() {
        let store = MemoryKeyStore::new(Arc::new(ManualClock::new(T0)));
        let mut r = record("aa");
        r.document_key = "not a key".into();
        assert!(matches!(store.put(r), Err(StegoError::InvalidKey)));
    }

    #[test]
    fn list_newest_first_and_delete() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = MemoryKeyStore::new(clock.clone());
        store.put(record("old")).unwrap();
        clock.advance(10);
        store.put(record("new")).unwrap();
        let hashes: Vec<_> = store.list().unwrap().into_iter().map(|r| r.document_hash).collect();
        assert_eq!(hashes, vec!["new", "old"]);
        assert!(store.delete("old").unwrap());
        assert!(!store.delete("old").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn expire_drops_idle_records() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = MemoryKeyStore::new(clock.clone());
        store.put(record("idle")).unwrap();
        store.put(record("busy")).unwrap();
        clock.advance(20 * SECS_PER_DAY);
        store.get("busy").unwrap();
        clock.advance(15 * SECS_PER_DAY);
        assert_eq!(store.expire(DEFAULT_EXPIRY_DAYS).unwrap(), 1);
        assert!(store.get("idle").unwrap().is_none());
        assert!(store.get("busy").unwrap().is_some());
    }

    #[test]
    fn json_backup_roundtrip() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = MemoryKeyStore::new(clock.clone());
        store.put(record("aa")).unwrap();
        store.put(record("bb")).unwrap();
        let json = store.export_json().unwrap();

        let restored = MemoryKeyStore::new(clock);
        assert_eq!(restored.import_json(&json).unwrap(), 2);
        assert_eq!(restored.list().unwrap(), store.list().unwrap());
    }

    #[test]
    fn cached_store_serves_hits_from_cache() {
        let clock = Arc::new(ManualClock::new(T0));
        let cached = CachedKeyStore::new(MemoryKeyStore::new(clock.clone()), 60, clock.clone());
        cached.put(record("aa")).unwrap();
        cached.get("aa").unwrap();
        cached.get("aa").unwrap();
        // Second lookup was a cache hit.
        assert_eq!(cached.inner().list().unwrap()[0].access_count, 2);

        clock.advance(61);
        cached.get("aa").unwrap();
        assert_eq!(cached.inner().list().unwrap()[0].access_count, 3);

        assert!(cached.delete("aa").unwrap());
        assert!(cached.get("aa").unwrap().is_none());
    }
}
