use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use orma_core::{Association, Key, Relation, RelationRef};

use super::{CachedValue, ContextCacheService, InverseKey, RecordKey};
use crate::application::ApplicationCacheRegistry;
use crate::statistics::CacheStatistics;

/// Default context cache: two owned hash maps.
pub struct ContextCache {
    records: HashMap<RecordKey, CachedValue>,
    inverse: HashMap<InverseKey, CachedValue>,
    statistics: Arc<CacheStatistics>,
    registry: Arc<ApplicationCacheRegistry>,
}

impl ContextCache {
    /// Create an empty cache reporting to the given counters and forwarding
    /// full invalidations to the process-wide registry.
    pub fn new(statistics: Arc<CacheStatistics>) -> Self {
        Self::with_registry(statistics, ApplicationCacheRegistry::global())
    }

    /// Create an empty cache forwarding full invalidations to `registry`.
    pub fn with_registry(
        statistics: Arc<CacheStatistics>,
        registry: Arc<ApplicationCacheRegistry>,
    ) -> Self {
        Self {
            records: HashMap::new(),
            inverse: HashMap::new(),
            statistics,
            registry,
        }
    }

    /// Create an empty cache reporting to the process-wide counters.
    pub fn with_global_statistics() -> Self {
        Self::new(CacheStatistics::global())
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::with_global_statistics()
    }
}

impl ContextCacheService for ContextCache {
    fn statistics(&self) -> &CacheStatistics {
        &self.statistics
    }

    fn registry(&self) -> &ApplicationCacheRegistry {
        &self.registry
    }

    fn get_record(&self, key: &RecordKey) -> Option<CachedValue> {
        self.records.get(key).cloned()
    }

    fn put_record(&mut self, key: RecordKey, value: CachedValue) {
        self.records.insert(key, value);
    }

    fn remove_record(&mut self, key: &RecordKey) -> bool {
        self.records.remove(key).is_some()
    }

    fn clear_records(&mut self, relation: Option<&Relation>) -> Vec<RelationRef> {
        match relation {
            None => {
                let touched: HashSet<RelationRef> = self
                    .records
                    .keys()
                    .map(|k| Arc::clone(k.relation()))
                    .collect();
                self.records.clear();
                touched.into_iter().collect()
            }
            Some(relation) => {
                let mut touched = None;
                self.records.retain(|k, _| {
                    if k.relation().as_ref() == relation {
                        touched.get_or_insert_with(|| Arc::clone(k.relation()));
                        false
                    } else {
                        true
                    }
                });
                touched.into_iter().collect()
            }
        }
    }

    fn get_inverse(&self, key: &InverseKey) -> Option<CachedValue> {
        self.inverse.get(key).cloned()
    }

    fn put_inverse(&mut self, key: InverseKey, value: CachedValue) {
        self.inverse.insert(key, value);
    }

    fn remove_inverse(&mut self, key: &InverseKey) -> bool {
        self.inverse.remove(key).is_some()
    }

    fn clear_inverse(&mut self, association: Option<&Association>) -> usize {
        let before = self.inverse.len();
        match association {
            None => self.inverse.clear(),
            Some(association) => self
                .inverse
                .retain(|k, _| k.association().as_ref() != association),
        }
        before - self.inverse.len()
    }

    fn remove_inverse_by_parent(&mut self, parent: &Relation, parent_key: &Key) -> usize {
        // Full scan: cheap relation check first, exact key comparison second.
        let before = self.inverse.len();
        self.inverse.retain(|k, _| {
            !(k.association().parent().as_ref() == parent && k.parent_key() == parent_key)
        });
        before - self.inverse.len()
    }

    fn record_count(&self) -> usize {
        self.records.len()
    }

    fn inverse_count(&self) -> usize {
        self.inverse.len()
    }
}
