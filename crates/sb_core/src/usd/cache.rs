//! Process-wide stage cache.
//!
//! Hosts that already hold an open stage hand the Reader a cache id instead of a filename.
//! Id 0 is reserved for "no cache".

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::stage::Stage;

/// Maps non-zero ids to shared stages.
#[derive(Debug)]
pub struct StageCache {
    stages: RwLock<HashMap<i64, Arc<Stage>>>,
    next_id: AtomicI64,
}

impl Default for StageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StageCache {
    pub fn new() -> Self {
        Self {
            stages: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// The cache shared by the whole process.
    pub fn global() -> &'static StageCache {
        static CACHE: OnceLock<StageCache> = OnceLock::new();
        CACHE.get_or_init(StageCache::new)
    }

    /// Insert a stage and return its id (never 0).
    pub fn insert(&self, stage: Arc<Stage>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.stages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, stage);
        log::debug!("Cached stage under id {}", id);
        id
    }

    pub fn find(&self, id: i64) -> Option<Arc<Stage>> {
        if id == 0 {
            return None;
        }
        self.stages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn erase(&self, id: i64) -> bool {
        self.stages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub fn clear(&self) {
        self.stages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.stages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_find_erase() {
        let cache = StageCache::new();
        let id = cache.insert(Arc::new(Stage::new_in_memory()));
        assert_ne!(id, 0);
        assert!(cache.find(id).is_some());
        assert!(cache.find(0).is_none());
        assert_eq!(cache.len(), 1);

        assert!(cache.erase(id));
        assert!(!cache.erase(id));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let cache = StageCache::new();
        let a = cache.insert(Arc::new(Stage::new_in_memory()));
        let b = cache.insert(Arc::new(Stage::new_in_memory()));
        assert_ne!(a, b);
        cache.clear();
        assert!(cache.find(a).is_none());
    }
}
