//! ORMA Cache - Two-Tier Record Cache
//!
//! The context tier memoizes records and child collections for one logical
//! context. The application tier, opted into per relation, keeps records in a
//! shared engine across contexts and is maintained by lifecycle hooks.
//! [`DataContext`] ties both tiers together.

pub mod application;
pub mod context;
pub mod data_context;
pub mod resolver;
pub mod runtime;
pub mod statistics;

pub use application::{
    engine_from_settings, ApplicationCache, ApplicationCacheRegistry, CacheEngine, EngineError,
    EngineStats, InvalidationReport, LmdbEngine, MemoryEngine, RegionScopedKey,
};
pub use context::{
    CachedValue, ContextCache, ContextCacheService, InverseKey, NoopContextCache, RecordCache,
    RecordKey,
};
pub use data_context::DataContext;
pub use resolver::{CacheServiceResolver, ContextCacheFactory};
pub use runtime::CacheRuntime;
pub use statistics::{CacheStatistics, RegionStatistics, StatisticsSnapshot};
