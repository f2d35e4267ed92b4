use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

// Cache settings, fixed at construction
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            max_size: 1000,
        }
    }
}

// Cache entry with its expiry deadline
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// Create a cache key (hash of namespace + parts), keeps raw tokens out of memory dumps
pub fn make_cache_key(namespace: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{}:{:x}", namespace, hasher.finalize())
}

struct Slot<V> {
    key: String,
    entry: CacheEntry<V>,
    prev: Option<usize>,
    next: Option<usize>,
}

// Recency list threaded through a slab; head is most recent, tail is next victim
struct LruStore<V> {
    map: HashMap<String, usize>,
    slots: Vec<Option<Slot<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<V> LruStore<V> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn slot(&self, idx: usize) -> Option<&Slot<V>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, idx: usize) -> Option<&mut Slot<V>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    fn unlink(&mut self, idx: usize) {
        let Some((prev, next)) = self.slot(idx).map(|s| (s.prev, s.next)) else {
            return;
        };

        match prev {
            Some(p) => {
                if let Some(slot) = self.slot_mut(p) {
                    slot.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(slot) = self.slot_mut(n) {
                    slot.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(slot) = self.slot_mut(idx) {
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(slot) = self.slot_mut(h) {
                slot.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn remove_index(&mut self, idx: usize) -> Option<Slot<V>> {
        self.unlink(idx);
        let slot = self.slots.get_mut(idx)?.take()?;
        self.map.remove(&slot.key);
        self.free.push(idx);
        Some(slot)
    }

    fn insert(&mut self, key: String, entry: CacheEntry<V>) {
        if let Some(&idx) = self.map.get(&key) {
            if let Some(slot) = self.slot_mut(idx) {
                slot.entry = entry;
            }
            self.touch(idx);
            return;
        }

        let slot = Slot {
            key: key.clone(),
            entry,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<usize> = self
            .map
            .values()
            .copied()
            .filter(|&idx| self.slot(idx).is_some_and(|s| s.entry.is_expired(now)))
            .collect();
        for &idx in &expired {
            self.remove_index(idx);
        }
        expired.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }
}

/// Response fragment cache bounded by both age and entry count.
///
/// Entries older than the TTL read as missing wherever they sit in the
/// recency order. When an insert pushes the cache past `max_size`, the least
/// recently used entries go first. Reads hand out clones, so keep values small.
pub struct ResponseCache<V> {
    config: CacheConfig,
    store: Mutex<LruStore<V>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config: CacheConfig {
                max_size: config.max_size.max(1),
                ..config
            },
            store: Mutex::new(LruStore::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruStore<V>> {
        // entries are plain data, a panic elsewhere can't leave them half written
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_at(key.into(), value, Instant::now());
    }

    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, Instant::now())
    }

    pub fn delete(&self, key: &str) {
        let mut store = self.lock();
        if let Some(idx) = store.map.get(key).copied() {
            store.remove_index(idx);
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.lock().purge_expired(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.config.max_size
    }

    pub(crate) fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut store = self.lock();
        let idx = *store.map.get(key)?;

        if store.slot(idx)?.entry.is_expired(now) {
            store.remove_index(idx);
            return None;
        }
        store.touch(idx);
        store.slot(idx).map(|s| s.entry.value.clone())
    }

    pub(crate) fn set_at(&self, key: String, value: V, now: Instant) {
        let entry = CacheEntry {
            value,
            expires_at: now + self.config.ttl,
        };

        let mut store = self.lock();
        store.insert(key, entry);
        // dead entries give up their slots before any live one is evicted
        if store.map.len() > self.config.max_size {
            store.purge_expired(now);
        }
        while store.map.len() > self.config.max_size {
            let Some(tail) = store.tail else { break };
            store.remove_index(tail);
        }
    }

    pub(crate) fn has_at(&self, key: &str, now: Instant) -> bool {
        let store = self.lock();
        store
            .map
            .get(key)
            .and_then(|&idx| store.slot(idx))
            .is_some_and(|s| !s.entry.is_expired(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_ms: u64, max_size: usize) -> ResponseCache<i32> {
        ResponseCache::new(CacheConfig {
            ttl: Duration::from_millis(ttl_ms),
            max_size,
        })
    }

    #[test]
    fn test_set_then_get() {
        let cache = cache(1_000, 4);
        cache.set("session", 7);

        assert_eq!(cache.get("session"), Some(7));
        assert!(cache.has("session"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_eviction_order() {
        let cache = cache(1_000, 2);
        let now = Instant::now();

        cache.set_at("a".into(), 1, now);
        cache.set_at("b".into(), 2, now);
        cache.set_at("c".into(), 3, now);

        assert_eq!(cache.get_at("a", now), None);
        assert_eq!(cache.get_at("b", now), Some(2));
        assert_eq!(cache.get_at("c", now), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let cache = cache(1_000, 2);
        let now = Instant::now();

        cache.set_at("a".into(), 1, now);
        cache.set_at("b".into(), 2, now);
        assert_eq!(cache.get_at("a", now), Some(1));
        cache.set_at("c".into(), 3, now);

        assert_eq!(cache.get_at("a", now), Some(1));
        assert_eq!(cache.get_at("b", now), None);
        assert_eq!(cache.get_at("c", now), Some(3));
    }

    #[test]
    fn test_has_does_not_refresh_recency() {
        let cache = cache(1_000, 2);
        let now = Instant::now();

        cache.set_at("a".into(), 1, now);
        cache.set_at("b".into(), 2, now);
        assert!(cache.has_at("a", now));
        cache.set_at("c".into(), 3, now);

        assert!(!cache.has_at("a", now));
        assert!(cache.has_at("b", now));
    }

    #[test]
    fn test_expired_entry_reads_as_missing() {
        let cache = cache(1_000, 10);
        let now = Instant::now();

        cache.set_at("a".into(), 1, now);
        assert_eq!(cache.get_at("a", now + Duration::from_millis(999)), Some(1));

        let later = now + Duration::from_millis(1_000);
        assert!(!cache.has_at("a", later));
        assert_eq!(cache.get_at("a", later), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_does_not_extend_ttl() {
        let cache = cache(1_000, 10);
        let now = Instant::now();

        cache.set_at("a".into(), 1, now);
        for ms in [200, 400, 600, 800] {
            assert!(cache.get_at("a", now + Duration::from_millis(ms)).is_some());
        }
        assert_eq!(cache.get_at("a", now + Duration::from_millis(1_001)), None);
    }

    #[test]
    fn test_overwrite_restarts_ttl_and_recency() {
        let cache = cache(1_000, 2);
        let now = Instant::now();

        cache.set_at("a".into(), 1, now);
        cache.set_at("b".into(), 2, now);
        let later = now + Duration::from_millis(800);
        cache.set_at("a".into(), 10, later);
        cache.set_at("c".into(), 3, later);

        assert_eq!(cache.get_at("b", later), None);
        assert_eq!(cache.get_at("a", now + Duration::from_millis(1_500)), Some(10));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = cache(1_000, 4);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        cache.delete("b");
        cache.delete("missing");
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);

        // slab is reusable after clear
        cache.set("d", 4);
        assert_eq!(cache.get("d"), Some(4));
    }

    #[test]
    fn test_slots_reused_after_delete() {
        let cache = cache(1_000, 3);
        let now = Instant::now();

        for round in 0..10 {
            let key = format!("k{round}");
            cache.set_at(key.clone(), round, now);
            cache.delete(&key);
        }
        assert!(cache.lock().slots.len() <= 1);
    }

    #[test]
    fn test_expired_entry_evicted_before_live_tail() {
        let cache = cache(1_000, 2);
        let start = Instant::now();
        let at = |ms| start + Duration::from_millis(ms);

        cache.set_at("a".into(), 1, at(0));
        cache.set_at("b".into(), 2, at(100));
        // a becomes most recent, b is the LRU tail
        assert_eq!(cache.get_at("a", at(500)), Some(1));

        // a expired at 1000, b lives until 1100
        cache.set_at("c".into(), 3, at(1_050));

        assert_eq!(cache.get_at("b", at(1_050)), Some(2));
        assert_eq!(cache.get_at("c", at(1_050)), Some(3));
        assert!(!cache.lock().map.contains_key("a"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_purge_expired() {
        let cache = cache(1_000, 10);
        let now = Instant::now();

        cache.set_at("old".into(), 1, now - Duration::from_secs(2));
        cache.set_at("fresh".into(), 2, now);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(2));
    }

    #[test]
    fn test_zero_max_size_is_raised_to_one() {
        let cache = cache(1_000, 0);
        cache.set("a", 1);
        cache.set("b", 2);

        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_cache_key_hides_parts() {
        let key = make_cache_key("session", &["secret-token"]);

        assert!(key.starts_with("session:"));
        assert!(!key.contains("secret-token"));
        assert_eq!(key, make_cache_key("session", &["secret-token"]));
        assert_ne!(key, make_cache_key("session", &["secret", "-token"]));
    }
}
