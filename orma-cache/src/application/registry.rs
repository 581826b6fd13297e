//! Process-wide list of relations that opted in to application caching.
//!
//! Reads are lock-free snapshots. Registration appends through
//! `ArcSwap::rcu`, so concurrent registrations never lose an entry.

use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use orma_core::{CacheError, SharedCache};

static GLOBAL_REGISTRY: Lazy<Arc<ApplicationCacheRegistry>> =
    Lazy::new(|| Arc::new(ApplicationCacheRegistry::new()));

/// Outcome of [`ApplicationCacheRegistry::invalidate_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Regions visited.
    pub regions: usize,
    /// Entries removed across all successful regions.
    pub removed: u64,
    /// Regions whose engine failed, with the error.
    pub failures: Vec<(String, CacheError)>,
}

impl InvalidationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Registry of application cache regions.
pub struct ApplicationCacheRegistry {
    regions: ArcSwap<Vec<Arc<dyn SharedCache>>>,
}

impl ApplicationCacheRegistry {
    pub fn new() -> Self {
        Self {
            regions: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<ApplicationCacheRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Append a region.
    pub fn register(&self, cache: Arc<dyn SharedCache>) {
        tracing::debug!(region = %cache.region(), "registered application cache region");
        self.regions.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&cache));
            next
        });
    }

    /// Region names in registration order.
    pub fn relations(&self) -> Vec<String> {
        self.regions
            .load()
            .iter()
            .map(|c| c.region().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.regions.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear every registered region.
    ///
    /// A failing region does not stop the others; failures are collected in
    /// the report.
    pub fn invalidate_all(&self) -> InvalidationReport {
        let snapshot = self.regions.load_full();
        let mut report = InvalidationReport {
            regions: snapshot.len(),
            ..InvalidationReport::default()
        };

        for cache in snapshot.iter() {
            match cache.invalidate_cache() {
                Ok(removed) => report.removed += removed,
                Err(e) => {
                    tracing::warn!(region = %cache.region(), error = %e, "failed to invalidate region");
                    report.failures.push((cache.region().to_string(), e));
                }
            }
        }

        tracing::debug!(
            regions = report.regions,
            removed = report.removed,
            failed = report.failures.len(),
            "invalidated all application cache regions"
        );
        report
    }
}

impl Default for ApplicationCacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orma_core::Key;
    use std::any::Any;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    struct StubRegion {
        name: String,
        entries: AtomicU64,
        fail: bool,
    }

    impl StubRegion {
        fn new(name: &str, entries: u64, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                entries: AtomicU64::new(entries),
                fail,
            })
        }
    }

    impl SharedCache for StubRegion {
        fn region(&self) -> &str {
            &self.name
        }

        fn evict(&self, _id: &Key) -> Result<(), CacheError> {
            Ok(())
        }

        fn invalidate_cache(&self) -> Result<u64, CacheError> {
            if self.fail {
                return Err(CacheError::Unavailable {
                    region: self.name.clone(),
                    reason: "engine down".into(),
                });
            }
            Ok(self.entries.swap(0, Ordering::SeqCst))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_register_and_list() {
        let registry = ApplicationCacheRegistry::new();
        assert!(registry.is_empty());
        registry.register(StubRegion::new("users", 0, false));
        registry.register(StubRegion::new("orders", 0, false));
        assert_eq!(registry.relations(), vec!["users".to_string(), "orders".to_string()]);
    }

    #[test]
    fn test_invalidate_all_continues_past_failures() {
        let registry = ApplicationCacheRegistry::new();
        let users = StubRegion::new("users", 3, false);
        registry.register(users.clone());
        registry.register(StubRegion::new("broken", 1, true));
        registry.register(StubRegion::new("orders", 2, false));

        let report = registry.invalidate_all();
        assert_eq!(report.regions, 3);
        assert_eq!(report.removed, 5);
        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "broken");
        assert_eq!(users.entries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_registration_keeps_all() {
        let registry = Arc::new(ApplicationCacheRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..25 {
                        registry.register(StubRegion::new(&format!("r{}_{}", t, i), 0, false));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(registry.len(), 200);
    }
}
