//! Per-object memoization of decoded BReps and entry ranges.
//!
//! Each object (or geometry part) owns one [`ElementGeometryCache`]. Both
//! maps sit behind a single mutex held only for one lookup or insert.
//! Caches never outlive the geometry they were derived from: the
//! [`GeometryCacheRegistry`] clears them on every mutation notification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::trace;
use vcad_snap_math::Range3;

use crate::kernel::BRepEntity;
use crate::stream::ElementId;

#[derive(Debug, Default)]
struct CacheMaps {
    breps: HashMap<u16, Arc<dyn BRepEntity>>,
    ranges: HashMap<u16, Range3>,
}

/// Counters for cache instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Times the cache was cleared.
    pub invalidations: u64,
}

/// Derived geometry of one object, keyed by feature index.
#[derive(Debug, Default)]
pub struct ElementGeometryCache {
    maps: Mutex<CacheMaps>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl ElementGeometryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheMaps> {
        self.maps.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn count<T>(&self, found: Option<T>) -> Option<T> {
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Decoded BRep for feature `index`.
    pub fn brep(&self, index: u16) -> Option<Arc<dyn BRepEntity>> {
        let found = self.lock().breps.get(&index).cloned();
        self.count(found)
    }

    /// Remember the decoded BRep for feature `index`.
    pub fn insert_brep(&self, index: u16, entity: Arc<dyn BRepEntity>) {
        self.lock().breps.insert(index, entity);
    }

    /// Local range of feature `index`.
    pub fn range(&self, index: u16) -> Option<Range3> {
        let found = self.lock().ranges.get(&index).copied();
        self.count(found)
    }

    /// Remember the local range of feature `index`.
    pub fn insert_range(&self, index: u16, range: Range3) {
        self.lock().ranges.insert(index, range);
    }

    /// Drop everything.
    pub fn invalidate(&self) {
        let mut maps = self.lock();
        maps.breps.clear();
        maps.ranges.clear();
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Caches for every object, created on first use.
#[derive(Debug, Default)]
pub struct GeometryCacheRegistry {
    caches: Mutex<HashMap<ElementId, Arc<ElementGeometryCache>>>,
}

impl GeometryCacheRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ElementId, Arc<ElementGeometryCache>>> {
        self.caches.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The cache of `id`, creating it when absent.
    pub fn get_or_create(&self, id: ElementId) -> Arc<ElementGeometryCache> {
        self.lock().entry(id).or_default().clone()
    }

    /// The cache of `id`, if one exists.
    pub fn get(&self, id: ElementId) -> Option<Arc<ElementGeometryCache>> {
        self.lock().get(&id).cloned()
    }

    /// Clear the cache of `id`.
    pub fn invalidate(&self, id: ElementId) {
        if let Some(cache) = self.get(id) {
            trace!(object = %id, "geometry cache invalidated");
            cache.invalidate();
        }
    }

    /// An object was (re)inserted.
    pub fn on_inserted(&self, id: ElementId) {
        self.invalidate(id);
    }

    /// An object is about to change.
    pub fn on_updated(&self, id: ElementId) {
        self.invalidate(id);
    }

    /// An object change is now visible.
    pub fn on_update_applied(&self, id: ElementId) {
        self.invalidate(id);
    }

    /// An object was deleted; its cache goes with it.
    pub fn on_deleted(&self, id: ElementId) {
        self.invalidate(id);
        self.lock().remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use vcad_snap_math::Point3;

    #[derive(Debug)]
    struct Block;

    impl BRepEntity for Block {
        fn range(&self) -> Range3 {
            Range3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_brep_hits_and_misses() {
        let cache = ElementGeometryCache::new();
        assert!(cache.brep(0).is_none());
        cache.insert_brep(0, Arc::new(Block));
        let a = cache.brep(0).unwrap();
        let b = cache.brep(0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_ranges_separate_from_breps() {
        let cache = ElementGeometryCache::new();
        cache.insert_range(2, Range3::new(Point3::origin(), Point3::new(2.0, 2.0, 0.0)));
        assert!(cache.brep(2).is_none());
        assert!(cache.range(2).is_some());
    }

    #[test]
    fn test_registry_invalidation() {
        let registry = GeometryCacheRegistry::new();
        let id = ElementId(5);
        let cache = registry.get_or_create(id);
        cache.insert_brep(1, Arc::new(Block));
        registry.on_updated(id);
        assert!(cache.brep(1).is_none());
        assert_eq!(cache.stats().invalidations, 1);

        registry.on_deleted(id);
        assert!(registry.get(id).is_none());
        assert!(!Arc::ptr_eq(&registry.get_or_create(id), &cache));
    }

    #[test]
    fn test_invalidate_unknown_is_noop() {
        let registry = GeometryCacheRegistry::new();
        registry.on_inserted(ElementId(1));
        assert!(registry.get(ElementId(1)).is_none());
    }
}
