// Snapshot cache
//
// Explicit TTL cache for computed analytics snapshots, keyed by the
// request's scope+window fingerprint. Lives entirely outside the
// engine: snapshots are identical with or without it, and failures
// are never stored as values.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::analytics::models::AnalyticsSnapshot;

/// Default time-to-live for cached snapshots (30 seconds)
const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Hard cap on cached entries. Custom windows make the key space
/// unbounded, so the map must not rely on TTL alone.
const MAX_ENTRIES: usize = 256;

/// Time-based cache of analytics snapshots
#[derive(Debug)]
pub struct SnapshotCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedSnapshot>>,
}

#[derive(Debug, Clone)]
struct CachedSnapshot {
    stored_at: Instant,
    snapshot: AnalyticsSnapshot,
}

impl SnapshotCache {
    /// Create a cache with the default TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a cache with a custom TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached snapshot for a key if it is still fresh.
    /// A stale entry is removed on lookup rather than left behind.
    pub async fn get(&self, key: &str) -> Option<AnalyticsSnapshot> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.snapshot.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        let stale = entries
            .get(key)
            .map(|entry| entry.stored_at.elapsed() >= self.ttl)
            .unwrap_or(false);
        if stale {
            entries.remove(key);
        }
        None
    }

    /// Store a snapshot under a key.
    ///
    /// Expired entries are purged first; if the map is still at
    /// capacity, the oldest entry makes room for the new one.
    pub async fn insert(&self, key: String, snapshot: AnalyticsSnapshot) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        if entries.len() >= MAX_ENTRIES && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, CachedSnapshot { stored_at: Instant::now(), snapshot });
    }

    /// Number of entries currently held, fresh or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drop every entry past its TTL
    pub async fn purge_expired(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
    }

    /// Drop all entries
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
