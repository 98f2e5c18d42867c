use std::{hash::Hash, time::Duration};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Minimum spacing between bulk purges triggered from `put`.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Key/value cache with per-entry expiry.
///
/// Entries are independent, so implementations may be shared across
/// sessions without any cross-key coordination.
pub trait TtlCache<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn put(&self, key: K, value: V, ttl: Duration);
    fn invalidate(&self, key: &K);
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-process cache backed by a `DashMap`. Expired entries are dropped
/// lazily on read, and `put` sweeps the whole map at most once per
/// [`PURGE_INTERVAL`] so keys that are never read again do not pile up.
pub struct MemoryCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    last_purge: Mutex<Instant>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last_purge: Mutex::new(Instant::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        *self.last_purge.lock() = now;
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    fn purge_if_due(&self) {
        let due = {
            let mut last = self.last_purge.lock();
            let now = Instant::now();
            if now.duration_since(*last) < PURGE_INTERVAL {
                false
            } else {
                *last = now;
                true
            }
        };
        if due {
            let now = Instant::now();
            self.entries.retain(|_, e| e.expires_at > now);
        }
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TtlCache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let expired = {
            let entry = self.entries.get(key)?;
            if entry.expires_at > Instant::now() {
                return Some(entry.value.clone());
            }
            true
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    fn put(&self, key: K, value: V, ttl: Duration) {
        self.purge_if_due();
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }
}
