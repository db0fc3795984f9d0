use std::{collections::HashMap, time::Duration};

use bytes::Bytes;
use tokio::time::Instant;

/// In-memory keyspace: values plus the expiry table for keys created with a TTL.
///
/// Both maps live in the same struct so callers hold a single lock
/// (`Arc<Mutex<KeyValueStore>>`) around any read-modify-write on a key.
#[derive(Debug, Default)]
pub struct KeyValueStore {
    entries: HashMap<Bytes, Bytes>,
    expirations: HashMap<Bytes, Instant>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`. A TTL records an absolute expiry; no TTL
    /// clears any expiry left over from a previous `set`.
    pub fn set(&mut self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        match ttl {
            Some(ttl) => {
                self.expirations.insert(key.clone(), Instant::now() + ttl);
            }
            None => {
                self.expirations.remove(&key);
            }
        }

        self.entries.insert(key, value);
    }

    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        self.expire_if_needed(key, Instant::now());
        self.entries.get(key).cloned()
    }

    /// Removes the key and its expiry. Returns whether the key was present.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.expire_if_needed(key, Instant::now());
        self.expirations.remove(key);

        self.entries.remove(key).is_some()
    }

    /// Reports presence, applying the same lazy expiry as [`KeyValueStore::get`].
    pub fn exists(&mut self, key: &[u8]) -> bool {
        self.expire_if_needed(key, Instant::now());
        self.entries.contains_key(key)
    }

    /// Drops every key whose expiry has passed. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<Bytes> = self
            .expirations
            .iter()
            .filter(|(_, expiration)| **expiration <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for key in expired {
            self.expirations.remove(&key);
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true when the key had expired and was removed.
    fn expire_if_needed(&mut self, key: &[u8], now: Instant) -> bool {
        let Some(&expiration) = self.expirations.get(key) else {
            return false;
        };

        if !self.entries.contains_key(key) {
            // Stale expiry with no value behind it.
            self.expirations.remove(key);
            return false;
        }

        if expiration > now {
            return false;
        }

        self.expirations.remove(key);
        self.entries.remove(key);
        true
    }
}
