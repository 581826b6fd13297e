use std::sync::Arc;

use orma_core::{Association, Key, Relation, RelationRef};

use super::{CachedValue, ContextCacheService, InverseKey, RecordKey};
use crate::application::ApplicationCacheRegistry;
use crate::statistics::CacheStatistics;

/// Context cache that stores nothing. Every lookup is a miss.
///
/// Selected with `ORMA_CONTEXT_CACHE=disabled`; useful when every read must
/// reach storage or the application tier.
///
/// Full invalidations still reach the application tier through `registry`.
pub struct NoopContextCache {
    statistics: Arc<CacheStatistics>,
    registry: Arc<ApplicationCacheRegistry>,
}

impl NoopContextCache {
    pub fn new(statistics: Arc<CacheStatistics>) -> Self {
        Self::with_registry(statistics, ApplicationCacheRegistry::global())
    }

    pub fn with_registry(
        statistics: Arc<CacheStatistics>,
        registry: Arc<ApplicationCacheRegistry>,
    ) -> Self {
        Self {
            statistics,
            registry,
        }
    }
}

impl ContextCacheService for NoopContextCache {
    fn statistics(&self) -> &CacheStatistics {
        &self.statistics
    }

    fn registry(&self) -> &ApplicationCacheRegistry {
        &self.registry
    }

    fn get_record(&self, _key: &RecordKey) -> Option<CachedValue> {
        None
    }

    fn put_record(&mut self, _key: RecordKey, _value: CachedValue) {}

    fn remove_record(&mut self, _key: &RecordKey) -> bool {
        false
    }

    fn clear_records(&mut self, _relation: Option<&Relation>) -> Vec<RelationRef> {
        Vec::new()
    }

    fn get_inverse(&self, _key: &InverseKey) -> Option<CachedValue> {
        None
    }

    fn put_inverse(&mut self, _key: InverseKey, _value: CachedValue) {}

    fn remove_inverse(&mut self, _key: &InverseKey) -> bool {
        false
    }

    fn clear_inverse(&mut self, _association: Option<&Association>) -> usize {
        0
    }

    fn remove_inverse_by_parent(&mut self, _parent: &Relation, _parent_key: &Key) -> usize {
        0
    }

    fn record_count(&self) -> usize {
        0
    }

    fn inverse_count(&self) -> usize {
        0
    }
}
