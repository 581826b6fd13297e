//! ORMA Core - Relations and Identity
//!
//! Types shared by every tier of the record cache: primary-key values,
//! entity identity, relations, associations, lifecycle hooks, errors and
//! settings. No caching logic lives here.

pub mod association;
pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod relation;

pub use association::{Association, AssociationRef};
pub use config::{
    CacheSettings, EngineKind, CONTEXT_CACHE_SETTING, DEFAULT_CONTEXT_CACHE,
    DISABLED_CONTEXT_CACHE,
};
pub use error::{CacheError, ConfigError, LifecycleError, LoadError, OrmaError, OrmaResult};
pub use identity::{EntityIdentity, Key};
pub use lifecycle::{LifecycleEvent, LifecycleHandler, LifecycleHooks, Mutation};
pub use relation::{Entity, Relation, RelationRef, SharedCache};
