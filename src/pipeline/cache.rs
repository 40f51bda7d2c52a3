//! Fingerprint-keyed cache of anonymization results.
//!
//! Identical uploads otherwise cost a full inference call each time. When
//! enabled (`cache_capacity > 0`), results are stored under the SHA-256 of
//! the uploaded bytes and evicted oldest-first once the capacity is reached.
//! Only successful results are stored.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Hex-encoded SHA-256 of an upload.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, String>,
    order: VecDeque<String>,
}

/// Bounded FIFO cache, safe to share between request tasks.
#[derive(Debug)]
pub struct ResultCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl ResultCache {
    /// `None` when `capacity` is zero (cache disabled).
    pub fn new(capacity: usize) -> Option<Self> {
        (capacity > 0).then(|| Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.map.get(key).cloned()
    }

    pub fn insert(&self, key: String, value: String) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.map.insert(key.clone(), value).is_some() {
            return;
        }
        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.map.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .map
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
