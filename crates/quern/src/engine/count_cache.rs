use std::{
    collections::BTreeMap,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

///
/// CountCache
///
/// Cached filtered totals, keyed by the rendered count statement (shape
/// plus binds) so two criteria that normalize identically share one
/// entry. Generation-stamped: any mutation bumps the generation, which
/// wholesale-invalidates every entry without walking the map.
///
/// NOTE: the engine may run single-threaded, but the cache is still
/// guarded by a Mutex to make shared mutability explicit.
///

#[derive(Debug, Default)]
pub(crate) struct CountCache {
    entries: Mutex<BTreeMap<String, CachedCount>>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Clone, Copy, Debug)]
struct CachedCount {
    total: u64,
    generation: u64,
}

///
/// CacheStats
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl CountCache {
    pub fn get(&self, key: &str) -> Option<u64> {
        let generation = self.generation.load(Ordering::Acquire);
        let entries = self.lock();
        match entries.get(key) {
            Some(cached) if cached.generation == generation => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(cached.total)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: String, total: u64) {
        let generation = self.generation.load(Ordering::Acquire);
        self.lock().insert(key, CachedCount { total, generation });
    }

    /// Invalidate every cached total. Stale generations are dropped
    /// lazily on the next lookup.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.lock().len(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, CachedCount>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

///
/// TESTS
///
