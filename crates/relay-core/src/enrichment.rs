//! Enrichment lookups with a bounded actor cache.
//!
//! [`Enricher`] fronts the [`EnrichmentStore`] with a slab-based LRU
//! cache for actor profiles, since the same actor recurs within bursts
//! of related events. Field and block-list lookups go straight to the
//! store.
//!
//! Cache entries are never invalidated proactively; a renamed actor may
//! be rendered under the old name until the entry is evicted. Under
//! normal event rates that staleness is bounded to a few minutes of
//! cache residency, which is acceptable for display names.

use std::collections::HashSet;
use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::RelayError;
use crate::store::{ActorProfile, EnrichmentStore, FieldInfo};

/// Sentinel value for null pointers in the LRU linked list.
const SENTINEL: usize = usize::MAX;

/// A slab node in the intrusive doubly-linked LRU list.
struct LruNode {
    key: u64,
    value: ActorProfile,
    prev: usize,
    next: usize,
}

/// O(1) slab-based LRU cache for actor profiles.
///
/// Uses an `FxHashMap<u64, usize>` for key→slot lookup and a
/// `Vec<LruNode>` slab with intrusive doubly-linked list pointers for
/// recency ordering.
pub struct ActorCache {
    index: FxHashMap<u64, usize>,
    slab: Vec<LruNode>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    max_entries: usize,
    gets: u64,
    hits: u64,
}

impl ActorCache {
    /// Creates a cache with the given maximum capacity.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            index: FxHashMap::default(),
            slab: Vec::new(),
            free: Vec::new(),
            head: SENTINEL,
            tail: SENTINEL,
            max_entries: max_entries.max(1),
            gets: 0,
            hits: 0,
        }
    }

    /// Looks up a key, promoting it to most-recently-used on hit.
    pub fn get(&mut self, key: u64) -> Option<ActorProfile> {
        self.gets += 1;
        let &slot = self.index.get(&key)?;
        self.hits += 1;
        self.detach(slot);
        self.push_front(slot);
        Some(self.slab[slot].value.clone())
    }

    /// Inserts a key-value pair, evicting the least-recently-used entry
    /// when the cache is full.
    pub fn insert(&mut self, key: u64, value: ActorProfile) {
        if let Some(&slot) = self.index.get(&key) {
            self.slab[slot].value = value;
            self.detach(slot);
            self.push_front(slot);
            return;
        }

        if self.index.len() >= self.max_entries {
            self.evict_tail();
        }

        let slot = if let Some(free_slot) = self.free.pop() {
            self.slab[free_slot] = LruNode {
                key,
                value,
                prev: SENTINEL,
                next: SENTINEL,
            };
            free_slot
        } else {
            let slot = self.slab.len();
            self.slab.push(LruNode {
                key,
                value,
                prev: SENTINEL,
                next: SENTINEL,
            });
            slot
        };

        self.index.insert(key, slot);
        self.push_front(slot);
    }

    /// Number of entries currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Cache hit rate in `[0.0, 1.0]`; 0.0 before any lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.hits as f64 / self.gets as f64
        }
    }

    fn detach(&mut self, slot: usize) {
        let prev = self.slab[slot].prev;
        let next = self.slab[slot].next;

        if prev == SENTINEL {
            self.head = next;
        } else {
            self.slab[prev].next = next;
        }

        if next == SENTINEL {
            self.tail = prev;
        } else {
            self.slab[next].prev = prev;
        }

        self.slab[slot].prev = SENTINEL;
        self.slab[slot].next = SENTINEL;
    }

    fn push_front(&mut self, slot: usize) {
        self.slab[slot].prev = SENTINEL;
        self.slab[slot].next = self.head;

        if self.head != SENTINEL {
            self.slab[self.head].prev = slot;
        }
        self.head = slot;

        if self.tail == SENTINEL {
            self.tail = slot;
        }
    }

    fn evict_tail(&mut self) {
        if self.tail == SENTINEL {
            return;
        }
        let slot = self.tail;
        self.detach(slot);
        let key = self.slab[slot].key;
        self.index.remove(&key);
        self.free.push(slot);
    }
}

impl std::fmt::Debug for ActorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorCache")
            .field("len", &self.len())
            .field("max_entries", &self.max_entries)
            .field("hit_rate", &self.hit_rate())
            .finish()
    }
}

/// Enrichment front-end used by the consumption loops.
pub struct Enricher {
    store: Arc<dyn EnrichmentStore>,
    actors: Mutex<ActorCache>,
}

impl Enricher {
    /// Creates an enricher over `store` with an actor cache of
    /// `cache_capacity` entries.
    #[must_use]
    pub fn new(store: Arc<dyn EnrichmentStore>, cache_capacity: usize) -> Self {
        Self {
            store,
            actors: Mutex::new(ActorCache::new(cache_capacity)),
        }
    }

    /// Resolves notification field display data. Uncached.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Lookup`] on store failure.
    pub async fn field(&self, field_ref: u64) -> Result<FieldInfo, RelayError> {
        self.store.resolve_field(field_ref).await
    }

    /// Resolves an actor profile through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Lookup`] on store failure; failures are
    /// not cached.
    pub async fn actor(&self, actor_id: u64) -> Result<ActorProfile, RelayError> {
        if let Some(profile) = self.actors.lock().get(actor_id) {
            return Ok(profile);
        }

        let profile = self.store.resolve_actor(actor_id).await?;
        debug!(actor_id, "actor profile cached");
        self.actors.lock().insert(actor_id, profile.clone());
        Ok(profile)
    }

    /// Resolves a user's block-list. Uncached.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Lookup`] on store failure.
    pub async fn blocklist(&self, user_id: u64) -> Result<HashSet<u64>, RelayError> {
        self.store.resolve_blocklist(user_id).await
    }

    /// Returns the actor cache hit rate.
    #[must_use]
    pub fn actor_cache_hit_rate(&self) -> f64 {
        self.actors.lock().hit_rate()
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("actors", &*self.actors.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEnrichmentStore;

    fn profile(name: &str) -> ActorProfile {
        ActorProfile {
            username: name.to_string(),
            nickname: name.to_string(),
        }
    }

    #[test]
    fn test_cache_hit_promotes() {
        let mut cache = ActorCache::new(2);
        cache.insert(1, profile("a"));
        cache.insert(2, profile("b"));

        // Touch 1 so 2 becomes the LRU entry.
        assert!(cache.get(1).is_some());
        cache.insert(3, profile("c"));

        assert!(cache.get(2).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_update_in_place() {
        let mut cache = ActorCache::new(4);
        cache.insert(1, profile("old"));
        cache.insert(1, profile("new"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1).unwrap().nickname, "new");
    }

    #[test]
    fn test_cache_eviction_order() {
        let mut cache = ActorCache::new(3);
        for id in 1..=5 {
            cache.insert(id, profile("x"));
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_none());
        assert!(cache.get(3).is_some());
        assert!(cache.get(5).is_some());
    }

    #[test]
    fn test_cache_hit_rate() {
        let mut cache = ActorCache::new(2);
        cache.insert(1, profile("a"));
        let _ = cache.get(1);
        let _ = cache.get(9);
        assert!((cache.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut cache = ActorCache::new(0);
        cache.insert(1, profile("a"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_enricher_caches_actor_lookups() {
        let store = Arc::new(MockEnrichmentStore::new());
        store.put_actor(7, "alice", "alice");

        let enricher = Enricher::new(store.clone(), 16);
        let first = enricher.actor(7).await.unwrap();
        let second = enricher.actor(7).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.actor_lookups(), 1);
    }

    #[tokio::test]
    async fn test_enricher_lookup_failure_not_cached() {
        let store = Arc::new(MockEnrichmentStore::new());
        let enricher = Enricher::new(store.clone(), 16);

        // Unknown actor: the error must surface and not poison the cache.
        assert!(enricher.actor(7).await.is_err());
        store.put_actor(7, "alice", "alice");
        assert!(enricher.actor(7).await.is_ok());
    }
}
