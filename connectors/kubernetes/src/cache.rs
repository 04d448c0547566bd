//! Resource diff cache.
//!
//! Process-wide store of the last-observed fingerprint per resource
//! identity. The classifier diffs incoming snapshots against these to detect
//! meaningful changes that the raw watch event type alone cannot reveal.
//!
//! The cache has no expiry: staleness is bounded by process lifetime, and a
//! restart simply treats every resource as first-seen. That never suppresses
//! `Added`/`Deleted` transitions, which are significant regardless of cache
//! state.

use crate::snapshot::ResourceIdentity;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Kind-specific minimal summary of prior observed state.
///
/// Owned exclusively by the cache; overwritten whole on every update, never
/// partially merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// Per-container restart counts
    Pod { restart_counts: BTreeMap<String, i32> },
    /// Container name to image, plus declared replica count
    Workload {
        images: BTreeMap<String, String>,
        replicas: Option<i32>,
    },
    /// Full data map; keys and values both participate in the diff
    ConfigMap { data: BTreeMap<String, String> },
    /// Sorted key names only. Values are never cached.
    Secret { keys: Vec<String> },
}

/// Keyed fingerprint store shared by all watch sessions of a cycle.
///
/// Sessions touch disjoint identities (one session owns one kind), so a
/// single mutex sees no real contention and critical sections are short.
pub trait FingerprintCache: Send + Sync {
    /// Last observed fingerprint for this identity, if any
    fn get(&self, identity: &ResourceIdentity) -> Option<Fingerprint>;
    /// Overwrite the fingerprint for this identity
    fn set(&self, identity: ResourceIdentity, fingerprint: Fingerprint);
    /// Drop the entry for a deleted resource
    fn remove(&self, identity: &ResourceIdentity);
}

/// In-memory fingerprint cache
#[derive(Debug, Default)]
pub struct MemoryFingerprintCache {
    entries: Mutex<HashMap<ResourceIdentity, Fingerprint>>,
}

impl MemoryFingerprintCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached identities
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FingerprintCache for MemoryFingerprintCache {
    fn get(&self, identity: &ResourceIdentity) -> Option<Fingerprint> {
        self.entries.lock().ok()?.get(identity).cloned()
    }

    fn set(&self, identity: ResourceIdentity, fingerprint: Fingerprint) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(identity, fingerprint);
        }
    }

    fn remove(&self, identity: &ResourceIdentity) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(identity);
        }
    }
}
