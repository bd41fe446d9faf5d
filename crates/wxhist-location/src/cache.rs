//! In-memory result cache with an optional freshness window.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Session-scoped cache. Entries older than the TTL are treated as missing;
/// a cache without a TTL keeps entries for as long as it lives.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache whose entries never go stale.
    pub fn unbounded() -> Self {
        Self {
            ttl: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let fresh = match (entries.get(key), self.ttl) {
            (None, _) => return None,
            (Some(_), None) => true,
            (Some(entry), Some(ttl)) => entry.stored_at.elapsed() < ttl,
        };

        if fresh {
            entries.get(key).map(|e| e.value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.lock().insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
