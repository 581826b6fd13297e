//! Relations, entities and the shared-cache capability handle.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use serde::{de::DeserializeOwned, Serialize};

use crate::lifecycle::{LifecycleEvent, LifecycleHooks, Mutation};
use crate::{CacheError, EntityIdentity, Key, OrmaResult};

/// Shared handle to a relation. Relations live for the whole process.
pub type RelationRef = Arc<Relation>;

/// Process-wide cache region a relation delegates to once it opts in to
/// application-level caching.
///
/// Only the operations the context tier needs are object-safe here; typed
/// lookups go through the concrete implementation via [`SharedCache::as_any`].
pub trait SharedCache: Send + Sync {
    /// Name of the region, equal to the relation's qualified name.
    fn region(&self) -> &str;

    /// Remove a single entry.
    fn evict(&self, id: &Key) -> Result<(), CacheError>;

    /// Clear the whole region, returning the number of removed entries.
    fn invalidate_cache(&self) -> Result<u64, CacheError>;

    fn as_any(&self) -> &dyn Any;
}

/// Schema-level descriptor of a record type, identified by its qualified name.
pub struct Relation {
    name: Arc<str>,
    primary_key: Vec<String>,
    hooks: LifecycleHooks,
    shared_cache: OnceLock<Arc<dyn SharedCache>>,
}

impl Relation {
    /// Create a relation with its qualified name and primary-key columns.
    pub fn new(name: impl Into<Arc<str>>, primary_key: &[&str]) -> RelationRef {
        Arc::new(Self {
            name: name.into(),
            primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
            hooks: LifecycleHooks::new(),
            shared_cache: OnceLock::new(),
        })
    }

    /// Qualified name, stable for the process lifetime.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    /// The application cache region, present only if the relation opted in.
    pub fn shared_cache(&self) -> Option<&Arc<dyn SharedCache>> {
        self.shared_cache.get()
    }

    pub fn is_shared_cached(&self) -> bool {
        self.shared_cache.get().is_some()
    }

    /// Attach the application cache region. A relation opts in at most once.
    pub fn attach_shared_cache(&self, cache: Arc<dyn SharedCache>) -> Result<(), CacheError> {
        self.shared_cache
            .set(cache)
            .map_err(|_| CacheError::AlreadyEnabled {
                relation: self.name.to_string(),
            })
    }

    /// Identity of a record of this relation.
    pub fn identity(&self, key: Option<Key>) -> EntityIdentity {
        EntityIdentity::new(Arc::clone(&self.name), key)
    }

    /// Fail fast when a record type is used with a relation it does not belong to.
    pub fn ensure_owns<T: Entity>(&self) -> Result<(), CacheError> {
        let owner = T::relation();
        if owner.name() != self.name() {
            return Err(CacheError::RelationMismatch {
                expected: self.name.to_string(),
                actual: owner.name().to_string(),
            });
        }
        Ok(())
    }

    /// Notify handlers that `record` was mutated.
    ///
    /// Called by the lifecycle layer after the mutation succeeded. Handlers
    /// run synchronously before this returns.
    pub fn notify<T: Entity>(&self, mutation: Mutation, record: &T) -> OrmaResult<()> {
        self.ensure_owns::<T>()?;
        let event = LifecycleEvent::new(self, mutation, record.primary_key(), record);
        self.hooks.dispatch(&event)
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Relation {}

impl Hash for Relation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("primary_key", &self.primary_key)
            .field("shared_cache", &self.is_shared_cached())
            .finish()
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A materialized record type that can be cached.
///
/// # Implementation Requirements
///
/// - `relation()` must return the same relation for every call
/// - `primary_key()` returns `None` only for records not yet persisted
/// - Implementations must be `Clone`, `Serialize` and `DeserializeOwned` so the
///   application tier can store them in an external engine
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn relation() -> RelationRef;

    fn primary_key(&self) -> Option<Key>;

    fn identity(&self) -> EntityIdentity {
        Self::relation().identity(self.primary_key())
    }
}
