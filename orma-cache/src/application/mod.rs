//! Application-scoped record cache.
//!
//! A relation opts in with [`ApplicationCache::enable`]. From then on it owns
//! one region of a shared [`CacheEngine`], named after the relation, that
//! lives across contexts and is kept in sync by lifecycle hooks:
//!
//! - after insert and after update, the record is stored under its key
//! - after delete, the entry is evicted
//!
//! # Entry Format
//!
//! `[cached_at: 8 bytes, i64 millis LE][JSON of Option<T>]`. An absent result
//! is stored too, so a known-missing row does not reach storage again.
//!
//! # Failures
//!
//! Engine failures surface as [`CacheError::Unavailable`], never as a miss.
//! An entry that fails to decode as `T` is a [`CacheError::Decoding`] error.

pub mod engine;
pub mod lmdb_backend;
pub mod memory;
pub mod region_key;
pub mod registry;

pub use engine::{CacheEngine, EngineError, EngineStats};
pub use lmdb_backend::LmdbEngine;
pub use memory::MemoryEngine;
pub use region_key::RegionScopedKey;
pub use registry::{ApplicationCacheRegistry, InvalidationReport};

use std::any::Any;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use orma_core::{
    CacheError, CacheSettings, ConfigError, EngineKind, Entity, Key, LifecycleError,
    LifecycleEvent, Mutation, OrmaError, OrmaResult, RelationRef, SharedCache,
};

use crate::statistics::{CacheStatistics, RegionStatistics};

/// Build the engine selected by `settings`.
pub fn engine_from_settings(settings: &CacheSettings) -> OrmaResult<Arc<dyn CacheEngine>> {
    settings.validate()?;
    match settings.engine {
        EngineKind::Memory => Ok(Arc::new(match settings.memory_max_entries_per_region {
            Some(cap) => MemoryEngine::with_capacity(cap),
            None => MemoryEngine::new(),
        })),
        EngineKind::Lmdb => {
            let path = settings
                .lmdb_path
                .as_ref()
                .ok_or_else(|| ConfigError::MissingRequired {
                    field: "lmdb_path".to_string(),
                })?;
            let engine = LmdbEngine::new(path, settings.lmdb_max_size_mb).map_err(|e| {
                ConfigError::InvalidValue {
                    field: "lmdb_path".to_string(),
                    value: path.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
            Ok(Arc::new(engine))
        }
    }
}

/// Application cache region of the relation of `T`.
pub struct ApplicationCache<T: Entity> {
    relation: RelationRef,
    engine: Arc<dyn CacheEngine>,
    region_statistics: RegionStatistics,
    statistics: Arc<CacheStatistics>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> ApplicationCache<T> {
    /// Opt the relation of `T` in to application caching.
    ///
    /// Attaches the region to the relation, registers the lifecycle hooks and
    /// adds the region to `registry`. Fails with
    /// [`CacheError::AlreadyEnabled`] if the relation already opted in, and
    /// with [`CacheError::Encoding`] if its name cannot address a region.
    pub fn enable(
        engine: Arc<dyn CacheEngine>,
        statistics: Arc<CacheStatistics>,
        registry: &ApplicationCacheRegistry,
    ) -> OrmaResult<Arc<Self>> {
        let relation = T::relation();
        RegionScopedKey::check_region(relation.name())?;
        let cache = Arc::new(Self {
            relation: Arc::clone(&relation),
            engine,
            region_statistics: RegionStatistics::new(),
            statistics,
            _marker: PhantomData,
        });

        relation.attach_shared_cache(Arc::clone(&cache) as Arc<dyn SharedCache>)?;

        for mutation in [Mutation::Insert, Mutation::Update, Mutation::Delete] {
            let weak: Weak<Self> = Arc::downgrade(&cache);
            relation.hooks().register(mutation, move |event| match weak.upgrade() {
                Some(cache) => cache.on_mutation(event),
                None => Ok(()),
            })?;
        }

        registry.register(Arc::clone(&cache) as Arc<dyn SharedCache>);
        tracing::debug!(
            relation = %relation.name(),
            engine = cache.engine.name(),
            "enabled application caching"
        );
        Ok(cache)
    }

    /// The region attached to `relation`, if it caches records of type `T`.
    pub fn of(relation: &RelationRef) -> Option<&Self> {
        relation
            .shared_cache()
            .and_then(|shared| shared.as_any().downcast_ref::<Self>())
    }

    pub fn relation(&self) -> &RelationRef {
        &self.relation
    }

    pub fn region_statistics(&self) -> &RegionStatistics {
        &self.region_statistics
    }

    pub fn engine_stats(&self) -> Result<EngineStats, CacheError> {
        self.engine.stats().map_err(|e| self.unavailable(e))
    }

    fn region(&self) -> &str {
        self.relation.name()
    }

    fn unavailable(&self, e: EngineError) -> CacheError {
        e.into_cache_error(self.region())
    }

    fn key(&self, id: &Key) -> Result<RegionScopedKey, CacheError> {
        RegionScopedKey::new(self.region(), id.clone())
    }

    fn encode(&self, value: Option<&T>, cached_at: DateTime<Utc>) -> Result<Vec<u8>, CacheError> {
        let json = serde_json::to_vec(&value).map_err(|e| CacheError::Encoding {
            region: self.region().to_string(),
            reason: e.to_string(),
        })?;
        let mut bytes = Vec::with_capacity(8 + json.len());
        bytes.extend_from_slice(&cached_at.timestamp_millis().to_le_bytes());
        bytes.extend_from_slice(&json);
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<(Option<T>, DateTime<Utc>), CacheError> {
        let decoding = |reason: String| CacheError::Decoding {
            region: self.region().to_string(),
            reason,
        };
        if bytes.len() < 8 {
            return Err(decoding(format!("entry too short: {} bytes", bytes.len())));
        }
        let (header, body) = bytes.split_at(8);
        let millis = i64::from_le_bytes(
            header
                .try_into()
                .map_err(|_| decoding("invalid timestamp".to_string()))?,
        );
        let cached_at = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| decoding(format!("timestamp out of range: {}", millis)))?;
        let value = serde_json::from_slice(body).map_err(|e| decoding(e.to_string()))?;
        Ok((value, cached_at))
    }

    fn entry(&self, id: &Key) -> Result<Option<(Option<T>, DateTime<Utc>)>, CacheError> {
        let key = self.key(id)?;
        match self.engine.get(&key).map_err(|e| self.unavailable(e))? {
            Some(bytes) => self.decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Peek at an entry without counting a hit or miss.
    ///
    /// `Some(None)` means the region remembers that the row is absent.
    pub fn lookup(&self, id: &Key) -> Result<Option<Option<T>>, CacheError> {
        Ok(self.entry(id)?.map(|(value, _)| value))
    }

    /// When the entry for `id` was stored.
    pub fn cached_at(&self, id: &Key) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self.entry(id)?.map(|(_, at)| at))
    }

    fn count_hit(&self) {
        self.region_statistics.hit();
        self.statistics.record_hit();
    }

    fn count_miss(&self) {
        self.region_statistics.miss();
        self.statistics.record_miss();
    }

    /// Lookup-or-compute.
    ///
    /// On a miss the supplier runs once and its full result, present or not,
    /// is stored. Engine failures on lookup or write-back are returned as
    /// [`CacheError::Unavailable`].
    pub fn cache<E, F>(&self, id: &Key, supplier: F) -> Result<Option<T>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Result<Option<T>, E>,
    {
        if let Some((value, _)) = self.entry(id)? {
            self.count_hit();
            tracing::trace!(region = %self.region(), %id, "application cache hit");
            return Ok(value);
        }

        self.count_miss();
        tracing::trace!(region = %self.region(), %id, "application cache miss");
        let loaded = supplier()?;
        self.put(id, loaded.as_ref())?;
        Ok(loaded)
    }

    /// Lookup-or-compute that treats an unavailable engine as a miss.
    ///
    /// Decoding and type errors are still returned. When the engine fails,
    /// the lookup counts as a miss and the supplier result is returned
    /// without write-back.
    pub fn cache_degrading<E, F>(&self, id: &Key, supplier: F) -> Result<Option<T>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Result<Option<T>, E>,
    {
        match self.entry(id) {
            Ok(Some((value, _))) => {
                self.count_hit();
                return Ok(value);
            }
            Ok(None) => self.count_miss(),
            Err(e) if e.is_unavailable() => {
                self.count_miss();
                tracing::warn!(region = %self.region(), %id, error = %e, "application cache unavailable, loading from storage");
                return supplier();
            }
            Err(e) => return Err(e.into()),
        }

        let loaded = supplier()?;
        if let Err(e) = self.put(id, loaded.as_ref()) {
            if !e.is_unavailable() {
                return Err(e.into());
            }
            tracing::warn!(region = %self.region(), %id, error = %e, "application cache write-back failed");
        }
        Ok(loaded)
    }

    /// Store `value` under `id`, overwriting any previous entry.
    pub fn put(&self, id: &Key, value: Option<&T>) -> Result<(), CacheError> {
        let bytes = self.encode(value, Utc::now())?;
        self.engine
            .put(&self.key(id)?, &bytes)
            .map_err(|e| self.unavailable(e))
    }

    /// Remove the entry for `id`. Returns whether it existed.
    pub fn evict(&self, id: &Key) -> Result<bool, CacheError> {
        let removed = self
            .engine
            .remove(&self.key(id)?)
            .map_err(|e| self.unavailable(e))?;
        tracing::trace!(region = %self.region(), %id, removed, "application cache evict");
        Ok(removed)
    }

    /// Clear the whole region.
    pub fn invalidate_cache(&self) -> Result<u64, CacheError> {
        let removed = self
            .engine
            .clear_region(self.region())
            .map_err(|e| self.unavailable(e))?;
        tracing::debug!(region = %self.region(), removed, "invalidated application cache region");
        Ok(removed)
    }

    fn on_mutation(&self, event: &LifecycleEvent<'_>) -> OrmaResult<()> {
        let Some(id) = event.key() else {
            tracing::debug!(
                relation = %self.region(),
                mutation = %event.mutation(),
                "record without primary key, application cache untouched"
            );
            return Ok(());
        };

        let result = match event.mutation() {
            Mutation::Insert | Mutation::Update => match event.record::<T>() {
                Some(record) => self.put(id, Some(record)),
                None => Err(CacheError::TypeMismatch {
                    relation: self.region().to_string(),
                    expected: std::any::type_name::<T>(),
                }),
            },
            Mutation::Delete => self.evict(id).map(|_| ()),
        };

        result.map_err(|e| {
            OrmaError::from(LifecycleError::HandlerFailed {
                relation: self.region().to_string(),
                mutation: event.mutation().to_string(),
                reason: e.to_string(),
            })
        })
    }
}

impl<T: Entity> SharedCache for ApplicationCache<T> {
    fn region(&self) -> &str {
        self.relation.name()
    }

    fn evict(&self, id: &Key) -> Result<(), CacheError> {
        ApplicationCache::evict(self, id).map(|_| ())
    }

    fn invalidate_cache(&self) -> Result<u64, CacheError> {
        ApplicationCache::invalidate_cache(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
