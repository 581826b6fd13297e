//! Post-mutation lifecycle hooks.
//!
//! The record lifecycle layer calls [`Relation::notify`](crate::Relation::notify)
//! after an insert, update or delete has succeeded. Every handler registered for
//! that mutation runs synchronously, inside the same call.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::{Key, LifecycleError, OrmaError, OrmaResult, Relation};

/// Kind of mutation that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mutation::Insert => "insert",
            Mutation::Update => "update",
            Mutation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A completed mutation, as seen by a handler.
pub struct LifecycleEvent<'a> {
    relation: &'a Relation,
    mutation: Mutation,
    key: Option<Key>,
    record: &'a (dyn Any + Send + Sync),
}

impl<'a> LifecycleEvent<'a> {
    pub fn new(
        relation: &'a Relation,
        mutation: Mutation,
        key: Option<Key>,
        record: &'a (dyn Any + Send + Sync),
    ) -> Self {
        Self {
            relation,
            mutation,
            key,
            record,
        }
    }

    pub fn relation(&self) -> &Relation {
        self.relation
    }

    pub fn mutation(&self) -> Mutation {
        self.mutation
    }

    /// Primary key of the mutated record, if it has one.
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// The mutated record, if it is a `T`.
    pub fn record<T: 'static>(&self) -> Option<&T> {
        self.record.downcast_ref::<T>()
    }
}

/// Handler invoked after a mutation succeeds.
pub type LifecycleHandler = Arc<dyn Fn(&LifecycleEvent<'_>) -> OrmaResult<()> + Send + Sync>;

/// Handlers registered on one relation, grouped by mutation.
///
/// Registration is append-only; handlers live as long as the relation.
#[derive(Default)]
pub struct LifecycleHooks {
    after_insert: RwLock<Vec<LifecycleHandler>>,
    after_update: RwLock<Vec<LifecycleHandler>>,
    after_delete: RwLock<Vec<LifecycleHandler>>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, mutation: Mutation) -> &RwLock<Vec<LifecycleHandler>> {
        match mutation {
            Mutation::Insert => &self.after_insert,
            Mutation::Update => &self.after_update,
            Mutation::Delete => &self.after_delete,
        }
    }

    /// Register a handler for one mutation kind.
    pub fn register<F>(&self, mutation: Mutation, handler: F) -> Result<(), LifecycleError>
    where
        F: Fn(&LifecycleEvent<'_>) -> OrmaResult<()> + Send + Sync + 'static,
    {
        self.slot(mutation)
            .write()
            .map_err(|_| LifecycleError::LockPoisoned)?
            .push(Arc::new(handler));
        Ok(())
    }

    pub fn after_insert<F>(&self, handler: F) -> Result<(), LifecycleError>
    where
        F: Fn(&LifecycleEvent<'_>) -> OrmaResult<()> + Send + Sync + 'static,
    {
        self.register(Mutation::Insert, handler)
    }

    pub fn after_update<F>(&self, handler: F) -> Result<(), LifecycleError>
    where
        F: Fn(&LifecycleEvent<'_>) -> OrmaResult<()> + Send + Sync + 'static,
    {
        self.register(Mutation::Update, handler)
    }

    pub fn after_delete<F>(&self, handler: F) -> Result<(), LifecycleError>
    where
        F: Fn(&LifecycleEvent<'_>) -> OrmaResult<()> + Send + Sync + 'static,
    {
        self.register(Mutation::Delete, handler)
    }

    /// Number of handlers registered for a mutation.
    pub fn len(&self, mutation: Mutation) -> usize {
        self.slot(mutation).read().map(|h| h.len()).unwrap_or(0)
    }

    /// Run every handler for the event's mutation.
    ///
    /// All handlers run even if one fails; the first failure is returned.
    pub fn dispatch(&self, event: &LifecycleEvent<'_>) -> OrmaResult<()> {
        // Snapshot so handlers may register further hooks without deadlocking.
        let handlers: Vec<LifecycleHandler> = self
            .slot(event.mutation())
            .read()
            .map_err(|_| LifecycleError::LockPoisoned)?
            .clone();

        let mut first_error: Option<OrmaError> = None;
        for handler in handlers {
            if let Err(e) = handler(event) {
                tracing::warn!(
                    relation = %event.relation().name(),
                    mutation = %event.mutation(),
                    error = %e,
                    "lifecycle handler failed"
                );
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("after_insert", &self.len(Mutation::Insert))
            .field("after_update", &self.len(Mutation::Update))
            .field("after_delete", &self.len(Mutation::Delete))
            .finish()
    }
}
