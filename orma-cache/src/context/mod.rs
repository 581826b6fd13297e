//! Context-scoped record cache.
//!
//! One [`ContextCacheService`] backs one logical context (a request or a
//! transaction). It holds two maps: the record cache, keyed by relation and
//! primary key, and the inverse cache, keyed by association and parent key.
//!
//! # Single writer
//!
//! Every mutating operation takes `&mut self`. A context is used by one flow
//! at a time, so the maps need no locking; sharing one instance between two
//! concurrently active contexts does not compile.
//!
//! # Typed access
//!
//! Implementations store type-erased values so that a single service can be
//! selected at runtime (see [`crate::resolver`]). The typed operations live in
//! the [`RecordCache`] extension trait, implemented for every service.

mod map;
mod noop;
mod typed;

pub use map::ContextCache;
pub use noop::NoopContextCache;
pub use typed::RecordCache;

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use orma_core::{Association, AssociationRef, Key, Relation, RelationRef};

use crate::application::ApplicationCacheRegistry;
use crate::statistics::CacheStatistics;

/// Type-erased cached value: a record, or a `Vec` of child records.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Record cache key: relation + primary key.
#[derive(Clone)]
pub struct RecordKey {
    relation: RelationRef,
    id: Key,
}

impl RecordKey {
    pub fn new(relation: &RelationRef, id: Key) -> Self {
        Self {
            relation: Arc::clone(relation),
            id,
        }
    }

    pub fn relation(&self) -> &RelationRef {
        &self.relation
    }

    pub fn id(&self) -> &Key {
        &self.id
    }
}

impl PartialEq for RecordKey {
    fn eq(&self, other: &Self) -> bool {
        self.relation == other.relation && self.id == other.id
    }
}

impl Eq for RecordKey {}

impl Hash for RecordKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.relation.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordKey({}#{})", self.relation.name(), self.id)
    }
}

/// Inverse cache key: association + parent key.
#[derive(Clone)]
pub struct InverseKey {
    association: AssociationRef,
    parent_key: Key,
}

impl InverseKey {
    pub fn new(association: &AssociationRef, parent_key: Key) -> Self {
        Self {
            association: Arc::clone(association),
            parent_key,
        }
    }

    pub fn association(&self) -> &AssociationRef {
        &self.association
    }

    pub fn parent_key(&self) -> &Key {
        &self.parent_key
    }
}

impl PartialEq for InverseKey {
    fn eq(&self, other: &Self) -> bool {
        self.association == other.association && self.parent_key == other.parent_key
    }
}

impl Eq for InverseKey {}

impl Hash for InverseKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.association.hash(state);
        self.parent_key.hash(state);
    }
}

impl fmt::Debug for InverseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InverseKey({}#{})", self.association.name(), self.parent_key)
    }
}

/// Storage contract of a context cache implementation.
///
/// Implementations only store and remove; counting, type checks and the
/// lookup-or-compute protocol are provided by [`RecordCache`].
pub trait ContextCacheService: Send {
    /// Counters this service reports hits and misses to.
    fn statistics(&self) -> &CacheStatistics;

    /// Application cache regions a full record invalidation reaches.
    fn registry(&self) -> &ApplicationCacheRegistry;

    fn get_record(&self, key: &RecordKey) -> Option<CachedValue>;

    /// Store a record, overwriting any previous entry for the key.
    fn put_record(&mut self, key: RecordKey, value: CachedValue);

    fn remove_record(&mut self, key: &RecordKey) -> bool;

    /// Drop record entries, all of them or those of one relation.
    ///
    /// Returns the distinct relations that had entries removed.
    fn clear_records(&mut self, relation: Option<&Relation>) -> Vec<RelationRef>;

    fn get_inverse(&self, key: &InverseKey) -> Option<CachedValue>;

    /// Store a child collection, overwriting any previous entry for the key.
    fn put_inverse(&mut self, key: InverseKey, value: CachedValue);

    fn remove_inverse(&mut self, key: &InverseKey) -> bool;

    /// Drop inverse entries, all of them or those of one association.
    fn clear_inverse(&mut self, association: Option<&Association>) -> usize;

    /// Remove every inverse entry whose association points at `parent` and
    /// whose parent key equals `parent_key`.
    fn remove_inverse_by_parent(&mut self, parent: &Relation, parent_key: &Key) -> usize;

    fn record_count(&self) -> usize;

    fn inverse_count(&self) -> usize;
}
