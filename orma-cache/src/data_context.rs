//! Two-tier record loading for one logical context.
//!
//! A [`DataContext`] stands for one request or transaction. Its context cache
//! is resolved on first use and dropped with the context. Record reads go
//! context tier first, then the relation's application tier when it opted
//! in, then the supplier; results are written back through both tiers.

use std::sync::Arc;

use orma_core::{AssociationRef, CacheError, ConfigError, Entity, Key, Mutation, OrmaResult};
use uuid::Uuid;

use crate::application::ApplicationCache;
use crate::context::{ContextCacheService, RecordCache};
use crate::runtime::CacheRuntime;

/// One logical context with its lazily resolved context cache.
pub struct DataContext {
    id: Uuid,
    runtime: CacheRuntime,
    cache: Option<Box<dyn ContextCacheService>>,
}

impl DataContext {
    pub fn new(runtime: CacheRuntime) -> Self {
        Self {
            id: Uuid::now_v7(),
            runtime,
            cache: None,
        }
    }

    /// Context bound to the process-wide runtime.
    pub fn with_global_runtime() -> Self {
        Self::new(CacheRuntime::global())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn runtime(&self) -> &CacheRuntime {
        &self.runtime
    }

    /// Whether the context cache has been resolved yet.
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// The context cache of this context, resolved on first call.
    ///
    /// Later calls return the same instance.
    pub fn cache(&mut self) -> Result<&mut dyn ContextCacheService, ConfigError> {
        let service = match self.cache.take() {
            Some(service) => service,
            None => {
                let service = self
                    .runtime
                    .resolver()
                    .resolve(
                        Arc::clone(self.runtime.statistics()),
                        Arc::clone(self.runtime.registry()),
                    )?;
                tracing::debug!(
                    context = %self.id,
                    implementation = %self.runtime.resolver().selected(),
                    "resolved context cache"
                );
                service
            }
        };
        Ok(&mut **self.cache.insert(service))
    }

    /// Load a record by primary key through both tiers.
    ///
    /// An unavailable application tier is logged and treated as a miss.
    /// Each call counts once in the global statistics: a context hit, or
    /// the application tier's hit or miss.
    pub fn load_record<T, E, F>(&mut self, id: &Key, supplier: F) -> Result<Option<T>, E>
    where
        T: Entity,
        E: From<CacheError> + From<ConfigError>,
        F: FnOnce() -> Result<Option<T>, E>,
    {
        let relation = T::relation();
        let cache = self.cache()?;
        match ApplicationCache::<T>::of(&relation) {
            Some(shared) => cache.cache_record_delegating(&relation, id, || {
                shared.cache_degrading(id, supplier)
            }),
            None => cache.cache_record(&relation, id, supplier),
        }
    }

    /// Load the children of `parent_id` along `association`.
    pub fn load_children<C, E, F>(
        &mut self,
        association: &AssociationRef,
        parent_id: &Key,
        supplier: F,
    ) -> Result<Vec<C>, E>
    where
        C: Entity,
        E: From<CacheError> + From<ConfigError>,
        F: FnOnce() -> Result<Vec<C>, E>,
    {
        self.cache()?.cache_inverse(association, parent_id, supplier)
    }

    /// Report a successful insert.
    ///
    /// The record replaces any context entry under its key, then the
    /// relation's lifecycle hooks run.
    pub fn record_inserted<T: Entity>(&mut self, record: &T) -> OrmaResult<()> {
        self.store(record)?;
        T::relation().notify(Mutation::Insert, record)
    }

    /// Report a successful update.
    pub fn record_updated<T: Entity>(&mut self, record: &T) -> OrmaResult<()> {
        self.store(record)?;
        T::relation().notify(Mutation::Update, record)
    }

    /// Report a successful delete.
    ///
    /// Evicts the record and every child collection cached under it, then
    /// runs the relation's lifecycle hooks.
    pub fn record_deleted<T: Entity>(&mut self, record: &T) -> OrmaResult<()> {
        let relation = T::relation();
        let cache = self.cache()?;
        if let Some(id) = record.primary_key() {
            cache.evict_record(&relation, &id);
            cache.evict_inverse_for(record);
        }
        relation.notify(Mutation::Delete, record)
    }

    fn store<T: Entity>(&mut self, record: &T) -> OrmaResult<()> {
        let relation = T::relation();
        let cache = self.cache()?;
        if let Some(id) = record.primary_key() {
            cache.update_record(&relation, &id, record.clone())?;
        }
        Ok(())
    }
}
