//! Process-wide cache state bundled into one handle.

use std::sync::Arc;

use orma_core::{CacheSettings, Entity, OrmaResult};

use crate::application::{ApplicationCache, ApplicationCacheRegistry, CacheEngine};
use crate::resolver::CacheServiceResolver;
use crate::statistics::CacheStatistics;

/// Statistics, application cache registry and context cache resolver.
///
/// [`CacheRuntime::global`] shares the process-wide singletons;
/// [`CacheRuntime::isolated`] builds fresh ones so tests and embedded users
/// do not observe each other's counters.
#[derive(Clone)]
pub struct CacheRuntime {
    statistics: Arc<CacheStatistics>,
    registry: Arc<ApplicationCacheRegistry>,
    resolver: Arc<CacheServiceResolver>,
}

impl CacheRuntime {
    pub fn global() -> Self {
        Self {
            statistics: CacheStatistics::global(),
            registry: ApplicationCacheRegistry::global(),
            resolver: CacheServiceResolver::global(),
        }
    }

    /// Fresh state with the default context cache.
    pub fn isolated() -> Self {
        Self::from_settings(&CacheSettings::default())
    }

    /// Fresh state with the context cache selected by `settings`.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            statistics: Arc::new(CacheStatistics::new()),
            registry: Arc::new(ApplicationCacheRegistry::new()),
            resolver: Arc::new(CacheServiceResolver::from_settings(settings)),
        }
    }

    pub fn statistics(&self) -> &Arc<CacheStatistics> {
        &self.statistics
    }

    pub fn registry(&self) -> &Arc<ApplicationCacheRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<CacheServiceResolver> {
        &self.resolver
    }

    /// Opt the relation of `T` in to application caching on `engine`.
    pub fn enable_application_cache<T: Entity>(
        &self,
        engine: Arc<dyn CacheEngine>,
    ) -> OrmaResult<Arc<ApplicationCache<T>>> {
        ApplicationCache::<T>::enable(engine, Arc::clone(&self.statistics), &self.registry)
    }
}
