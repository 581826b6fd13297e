//! Selection of the context cache implementation.
//!
//! The `ORMA_CONTEXT_CACHE` setting names the implementation every new
//! context gets. `"default"` and `"disabled"` are built in; other names must
//! be registered before the first context resolves its cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use orma_core::{
    CacheError, CacheSettings, ConfigError, CONTEXT_CACHE_SETTING, DEFAULT_CONTEXT_CACHE,
    DISABLED_CONTEXT_CACHE,
};

use crate::application::ApplicationCacheRegistry;
use crate::context::{ContextCache, ContextCacheService, NoopContextCache};
use crate::statistics::CacheStatistics;

/// Builds a fresh context cache reporting to the given counters and
/// forwarding full invalidations to the given registry.
pub type ContextCacheFactory = Arc<
    dyn Fn(Arc<CacheStatistics>, Arc<ApplicationCacheRegistry>) -> Box<dyn ContextCacheService>
        + Send
        + Sync,
>;

static GLOBAL_RESOLVER: Lazy<Arc<CacheServiceResolver>> =
    Lazy::new(|| Arc::new(CacheServiceResolver::from_settings(&CacheSettings::from_env())));

/// Resolver of context cache implementations by name.
pub struct CacheServiceResolver {
    selected: String,
    factories: RwLock<HashMap<String, ContextCacheFactory>>,
}

impl CacheServiceResolver {
    /// Resolver selecting `selected`, with the built-in implementations
    /// registered.
    pub fn new(selected: impl Into<String>) -> Self {
        let mut factories: HashMap<String, ContextCacheFactory> = HashMap::new();
        factories.insert(
            DEFAULT_CONTEXT_CACHE.to_string(),
            Arc::new(
                |stats: Arc<CacheStatistics>, registry: Arc<ApplicationCacheRegistry>| {
                    Box::new(ContextCache::with_registry(stats, registry))
                        as Box<dyn ContextCacheService>
                },
            ),
        );
        factories.insert(
            DISABLED_CONTEXT_CACHE.to_string(),
            Arc::new(
                |stats: Arc<CacheStatistics>, registry: Arc<ApplicationCacheRegistry>| {
                    Box::new(NoopContextCache::with_registry(stats, registry))
                        as Box<dyn ContextCacheService>
                },
            ),
        );
        Self {
            selected: selected.into().trim().to_string(),
            factories: RwLock::new(factories),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.context_cache.as_str())
    }

    /// The process-wide resolver, configured from the environment on first use.
    pub fn global() -> Arc<CacheServiceResolver> {
        Arc::clone(&GLOBAL_RESOLVER)
    }

    /// Name of the implementation new contexts receive.
    pub fn selected(&self) -> &str {
        &self.selected
    }

    /// Register a custom implementation, replacing any previous one of the
    /// same name.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> Result<(), CacheError>
    where
        F: Fn(Arc<CacheStatistics>, Arc<ApplicationCacheRegistry>) -> Box<dyn ContextCacheService>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        tracing::debug!(name = %name, "registered context cache implementation");
        self.factories
            .write()
            .map_err(|_| CacheError::LockPoisoned)?
            .insert(name, Arc::new(factory));
        Ok(())
    }

    /// Names of all registered implementations, sorted.
    pub fn implementations(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Create the context cache for one new context.
    pub fn resolve(
        &self,
        statistics: Arc<CacheStatistics>,
        registry: Arc<ApplicationCacheRegistry>,
    ) -> Result<Box<dyn ContextCacheService>, ConfigError> {
        let factory = self
            .factories
            .read()
            .map_err(|_| ConfigError::InvalidValue {
                field: CONTEXT_CACHE_SETTING.to_string(),
                value: self.selected.clone(),
                reason: "implementation registry lock poisoned".to_string(),
            })?
            .get(&self.selected)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownImplementation {
                setting: CONTEXT_CACHE_SETTING.to_string(),
                name: self.selected.clone(),
            })?;
        Ok(factory(statistics, registry))
    }
}

impl Default for CacheServiceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_CACHE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RecordCache;

    fn fresh() -> (Arc<CacheStatistics>, Arc<ApplicationCacheRegistry>) {
        (
            Arc::new(CacheStatistics::new()),
            Arc::new(ApplicationCacheRegistry::new()),
        )
    }

    #[test]
    fn test_builtins_registered() {
        let resolver = CacheServiceResolver::default();
        assert_eq!(resolver.selected(), "default");
        assert_eq!(
            resolver.implementations(),
            vec!["default".to_string(), "disabled".to_string()]
        );
        let (stats, registry) = fresh();
        assert!(resolver.resolve(stats, registry).is_ok());
    }

    #[test]
    fn test_unknown_implementation() {
        let resolver = CacheServiceResolver::new("redis");
        let (stats, registry) = fresh();
        let err = resolver
            .resolve(stats, registry)
            .err()
            .expect("resolution should fail");
        assert_eq!(
            err,
            ConfigError::UnknownImplementation {
                setting: "ORMA_CONTEXT_CACHE".into(),
                name: "redis".into(),
            }
        );
    }

    #[test]
    fn test_custom_implementation() {
        let resolver = CacheServiceResolver::new("custom");
        resolver
            .register("custom", |stats, registry| {
                Box::new(NoopContextCache::with_registry(stats, registry))
                    as Box<dyn ContextCacheService>
            })
            .expect("register should succeed");
        let (stats, registry) = fresh();
        let mut service = resolver
            .resolve(stats, registry)
            .expect("resolution should succeed");
        service.invalidate_inverse();
        assert_eq!(service.record_count(), 0);
    }

    #[test]
    fn test_each_resolution_is_a_fresh_instance() {
        let resolver = CacheServiceResolver::default();
        let (stats, registry) = fresh();
        let mut first = resolver
            .resolve(Arc::clone(&stats), Arc::clone(&registry))
            .expect("resolve");
        let second = resolver.resolve(stats, registry).expect("resolve");
        first
            .invalidate_records_of(&orma_core::Relation::new("r", &["id"]))
            .expect("no shared region");
        assert_eq!(first.record_count(), 0);
        assert_eq!(second.record_count(), 0);
    }

    #[test]
    fn test_selected_is_trimmed() {
        let settings = CacheSettings::new().with_context_cache(" disabled ");
        let resolver = CacheServiceResolver::from_settings(&settings);
        assert_eq!(resolver.selected(), "disabled");
    }
}
