use std::any::type_name;
use std::sync::Arc;

use orma_core::{AssociationRef, CacheError, Entity, Key, Relation, RelationRef};

use super::{CachedValue, ContextCacheService, InverseKey, RecordKey};

fn downcast<T: Clone + 'static>(value: &CachedValue, owner: &str) -> Result<T, CacheError> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| CacheError::TypeMismatch {
            relation: owner.to_string(),
            expected: type_name::<T>(),
        })
}

/// Typed operations of the context cache.
///
/// Implemented for every [`ContextCacheService`], including trait objects.
/// Suppliers are deferred computations (typically a database read); they run
/// at most once per call and only on a miss. A supplier error propagates to
/// the caller and nothing is cached.
pub trait RecordCache: ContextCacheService {
    /// Clear the record cache.
    ///
    /// Every application cache region in this service's registry is
    /// invalidated too, whether or not this context touched it. All regions
    /// are attempted; the first failure is returned.
    fn invalidate_records(&mut self) -> Result<(), CacheError> {
        let touched = self.clear_records(None);
        let report = self.registry().invalidate_all();
        tracing::debug!(
            relations = touched.len(),
            regions = report.regions,
            removed = report.removed,
            "invalidated context record cache"
        );
        match report.failures.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(()),
        }
    }

    /// Clear record entries of one relation, and its application cache
    /// region when it opted in.
    fn invalidate_records_of(&mut self, relation: &Relation) -> Result<(), CacheError> {
        self.clear_records(Some(relation));
        tracing::debug!(relation = %relation.name(), "invalidated context records");
        match relation.shared_cache() {
            Some(shared) => shared.invalidate_cache().map(|_| ()),
            None => Ok(()),
        }
    }

    /// Look up `(relation, id)`, computing and storing it on a miss.
    ///
    /// Only a present result is stored; `Ok(None)` from the supplier is
    /// returned but not remembered.
    fn cache_record<T, E, F>(&mut self, relation: &RelationRef, id: &Key, supplier: F) -> Result<Option<T>, E>
    where
        T: Entity,
        E: From<CacheError>,
        F: FnOnce() -> Result<Option<T>, E>,
    {
        lookup_or_load(self, relation, id, true, supplier)
    }

    /// Like [`cache_record`](Self::cache_record), for suppliers that consult
    /// the application tier: a miss here is not counted, the next tier
    /// counts the lookup instead.
    fn cache_record_delegating<T, E, F>(
        &mut self,
        relation: &RelationRef,
        id: &Key,
        supplier: F,
    ) -> Result<Option<T>, E>
    where
        T: Entity,
        E: From<CacheError>,
        F: FnOnce() -> Result<Option<T>, E>,
    {
        lookup_or_load(self, relation, id, false, supplier)
    }

    /// Remove a single record entry.
    fn evict_record(&mut self, relation: &RelationRef, id: &Key) -> bool {
        self.remove_record(&RecordKey::new(relation, id.clone()))
    }

    /// Replace the entry for `(relation, id)` with `record`, returning it.
    fn update_record<T: Entity>(&mut self, relation: &RelationRef, id: &Key, record: T) -> Result<T, CacheError> {
        relation.ensure_owns::<T>()?;
        let key = RecordKey::new(relation, id.clone());
        self.remove_record(&key);
        self.put_record(key, Arc::new(record.clone()));
        Ok(record)
    }

    /// Clear the inverse cache.
    fn invalidate_inverse(&mut self) {
        let removed = self.clear_inverse(None);
        tracing::debug!(removed, "invalidated context inverse cache");
    }

    /// Clear inverse entries of one association.
    fn invalidate_inverse_of(&mut self, association: &AssociationRef) {
        let removed = self.clear_inverse(Some(association));
        tracing::debug!(association = %association.name(), removed, "invalidated context inverse entries");
    }

    /// Look up the children of `parent_id` along `association`, computing
    /// and storing them on a miss. Child order is kept as supplied.
    fn cache_inverse<C, E, F>(
        &mut self,
        association: &AssociationRef,
        parent_id: &Key,
        supplier: F,
    ) -> Result<Vec<C>, E>
    where
        C: Entity,
        E: From<CacheError>,
        F: FnOnce() -> Result<Vec<C>, E>,
    {
        association.ensure_child::<C>()?;
        let key = InverseKey::new(association, parent_id.clone());

        if let Some(cached) = self.get_inverse(&key) {
            self.statistics().inverse_hit();
            tracing::trace!(association = %association.name(), %parent_id, "context inverse hit");
            return Ok(downcast::<Vec<C>>(&cached, association.child().name())?);
        }

        self.statistics().inverse_miss();
        tracing::trace!(association = %association.name(), %parent_id, "context inverse miss");

        let children = supplier()?;
        self.put_inverse(key, Arc::new(children.clone()));
        Ok(children)
    }

    /// Remove a single inverse entry.
    fn evict_inverse(&mut self, association: &AssociationRef, parent_id: &Key) -> bool {
        self.remove_inverse(&InverseKey::new(association, parent_id.clone()))
    }

    /// Replace the children cached for `(association, parent_id)`, returning them.
    fn update_inverse<C: Entity>(
        &mut self,
        association: &AssociationRef,
        parent_id: &Key,
        children: Vec<C>,
    ) -> Result<Vec<C>, CacheError> {
        association.ensure_child::<C>()?;
        let key = InverseKey::new(association, parent_id.clone());
        self.remove_inverse(&key);
        self.put_inverse(key, Arc::new(children.clone()));
        Ok(children)
    }

    /// Parent-scoped cascade: drop every child collection cached under
    /// `parent`, across all associations pointing at its relation.
    ///
    /// An unidentified parent has no cached children; returns the number of
    /// removed entries.
    fn evict_inverse_for<P: Entity>(&mut self, parent: &P) -> usize {
        let Some(parent_key) = parent.primary_key() else {
            return 0;
        };
        let relation = P::relation();
        let removed = self.remove_inverse_by_parent(&relation, &parent_key);
        tracing::debug!(relation = %relation.name(), key = %parent_key, removed, "cascaded inverse eviction");
        removed
    }

    /// Drop the collection `child` belongs to along `association`.
    fn evict_inverse_for_child<C: Entity>(
        &mut self,
        association: &AssociationRef,
        child: &C,
    ) -> Result<bool, CacheError> {
        Ok(match association.parent_key_of(child)? {
            Some(parent_key) => self.evict_inverse(association, &parent_key),
            None => false,
        })
    }
}

impl<S: ContextCacheService + ?Sized> RecordCache for S {}

fn lookup_or_load<S, T, E, F>(
    service: &mut S,
    relation: &RelationRef,
    id: &Key,
    count_miss: bool,
    supplier: F,
) -> Result<Option<T>, E>
where
    S: ContextCacheService + ?Sized,
    T: Entity,
    E: From<CacheError>,
    F: FnOnce() -> Result<Option<T>, E>,
{
    relation.ensure_owns::<T>()?;
    let key = RecordKey::new(relation, id.clone());

    if let Some(cached) = service.get_record(&key) {
        service.statistics().record_hit();
        tracing::trace!(relation = %relation.name(), %id, "context record hit");
        return Ok(Some(downcast::<T>(&cached, relation.name())?));
    }

    if count_miss {
        service.statistics().record_miss();
    }
    tracing::trace!(relation = %relation.name(), %id, "context record miss");

    let loaded = supplier()?;
    if let Some(record) = &loaded {
        service.put_record(key, Arc::new(record.clone()));
    }
    Ok(loaded)
}
