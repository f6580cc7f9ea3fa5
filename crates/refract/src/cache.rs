//! Member cache
//!
//! Caches, per type, the methods declared by that exact type. Entries hold
//! only a weak reference to their type descriptor and are checked against
//! the live descriptor on every read, so a replaced or dropped type is never
//! served. The cache is bounded; when full, the least recently used entry is
//! evicted. Entries are a pure function of their key, so eviction is never
//! observable beyond a recomputation.

use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use rustc_hash::FxHasher;

use crate::member::MethodDescriptor;
use crate::types::{TypeDescriptor, TypeId};

/// Default number of cached types
pub const DEFAULT_CAPACITY: usize = 256;

/// Methods declared by one type
pub type MethodList = Arc<[Arc<MethodDescriptor>]>;

struct CacheEntry {
    owner: Weak<TypeDescriptor>,
    generation: u64,
    methods: MethodList,
    last_used: AtomicU64,
}

impl CacheEntry {
    fn is_for(&self, ty: &Arc<TypeDescriptor>) -> bool {
        self.generation == ty.generation()
            && std::ptr::eq(self.owner.as_ptr(), Arc::as_ptr(ty))
            && self.owner.strong_count() > 0
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that had to compute the entry
    pub misses: u64,
    /// Entries removed by capacity pressure or invalidation
    pub evictions: u64,
    /// Entries currently held
    pub entries: usize,
}

/// Bounded, concurrent per-type method cache
pub struct MemberCache {
    entries: DashMap<TypeId, CacheEntry, BuildHasherDefault<FxHasher>>,
    capacity: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemberCache {
    /// Create a cache holding at most `capacity` types (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_hasher(BuildHasherDefault::default()),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Methods declared by `ty` itself, in declaration order.
    ///
    /// Concurrent first lookups of the same type may each compute the list;
    /// the last insert wins and every caller sees an equal value.
    pub fn declared_methods(&self, ty: &Arc<TypeDescriptor>) -> MethodList {
        let now = self.clock.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = self.entries.get(&ty.id()) {
            if entry.is_for(ty) {
                entry.last_used.store(now, Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return entry.methods.clone();
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let methods: MethodList = ty.declared_methods().iter().cloned().collect();
        let replaced = self.entries.insert(
            ty.id(),
            CacheEntry {
                owner: Arc::downgrade(ty),
                generation: ty.generation(),
                methods: methods.clone(),
                last_used: AtomicU64::new(now),
            },
        );
        if replaced.is_none() {
            self.enforce_capacity(ty.id());
        }
        methods
    }

    fn enforce_capacity(&self, keep: TypeId) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .filter(|entry| *entry.key() != keep)
                .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
                .map(|entry| *entry.key());
            match oldest {
                Some(id) => {
                    if self.entries.remove(&id).is_some() {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
                None => break,
            }
        }
    }

    /// Drop the entry for `id`; returns whether one existed
    pub fn evict(&self, id: TypeId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Drop entries whose type descriptor no longer exists
    pub fn purge_stale(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.owner.strong_count() > 0);
        let purged = before.saturating_sub(self.entries.len());
        self.evictions.fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Whether an entry for `id` is present (stale or not)
    pub fn contains(&self, id: TypeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl Default for MemberCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for MemberCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Member;
    use crate::builder::{MethodDef, TypeBuilder};
    use crate::registry::TypeRegistry;
    use crate::value::Value;

    fn noop(name: &str) -> MethodDef {
        MethodDef::new(name, |_, _| Ok(Value::Null))
    }

    #[test]
    fn test_hit_after_miss() {
        let registry = TypeRegistry::new();
        let id = registry
            .register(TypeBuilder::class("A").method(noop("a")).method(noop("b")))
            .unwrap();
        let ty = registry.get(id).unwrap();
        let cache = MemberCache::new(4);

        let first = cache.declared_methods(&ty);
        let second = cache.declared_methods(&ty);
        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let registry = TypeRegistry::new();
        let ids: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|n| registry.register(TypeBuilder::class(*n)).unwrap())
            .collect();
        let types: Vec<_> = ids.iter().map(|id| registry.get(*id).unwrap()).collect();
        let cache = MemberCache::new(2);

        cache.declared_methods(&types[0]);
        cache.declared_methods(&types[1]);
        cache.declared_methods(&types[0]);
        cache.declared_methods(&types[2]);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(ids[0]));
        assert!(!cache.contains(ids[1]));
        assert!(cache.contains(ids[2]));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_replaced_descriptor_is_recomputed() {
        let registry = TypeRegistry::new();
        let id = registry.register(TypeBuilder::class("A").method(noop("old"))).unwrap();
        let cache = MemberCache::default();
        let before = cache.declared_methods(&registry.get(id).unwrap());
        assert_eq!(before[0].name(), "old");

        registry
            .redefine(id, TypeBuilder::class("A").method(noop("new")))
            .unwrap();
        let after = cache.declared_methods(&registry.get(id).unwrap());
        assert_eq!(after[0].name(), "new");
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_purge_stale_entries() {
        let registry = TypeRegistry::new();
        let id = registry.register(TypeBuilder::class("Gone")).unwrap();
        let cache = MemberCache::default();
        cache.declared_methods(&registry.get(id).unwrap());

        registry.unregister(id).unwrap();
        assert!(cache.contains(id));
        assert_eq!(cache.purge_stale(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_and_clear() {
        let registry = TypeRegistry::new();
        let id = registry.register(TypeBuilder::class("A")).unwrap();
        let cache = MemberCache::default();
        cache.declared_methods(&registry.get(id).unwrap());
        assert!(cache.evict(id));
        assert!(!cache.evict(id));

        cache.declared_methods(&registry.get(id).unwrap());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
    }
}
