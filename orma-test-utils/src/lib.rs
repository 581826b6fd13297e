//! ORMA Test Utilities
//!
//! Shared test infrastructure for the ORMA workspace:
//! - Fixture entities with their relations and associations
//! - Call-counting suppliers
//! - An engine with switchable failure injection
//! - Proptest generators for keys and fixtures
//! - Custom assertions for cache errors

pub use orma_cache::{CacheEngine, EngineError, EngineStats, MemoryEngine, RegionScopedKey};
pub use orma_core::{
    Association, AssociationRef, CacheError, Entity, Key, LoadError, OrmaError, OrmaResult,
    Relation, RelationRef,
};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

// ============================================================================
// FIXTURE ENTITIES
// ============================================================================

/// Relation of [`User`].
pub fn users() -> RelationRef {
    static USERS: OnceLock<RelationRef> = OnceLock::new();
    Arc::clone(USERS.get_or_init(|| Relation::new("public.users", &["id"])))
}

/// Relation of [`Team`].
pub fn teams() -> RelationRef {
    static TEAMS: OnceLock<RelationRef> = OnceLock::new();
    Arc::clone(TEAMS.get_or_init(|| Relation::new("public.teams", &["id"])))
}

/// Relation of [`Order`].
pub fn orders() -> RelationRef {
    static ORDERS: OnceLock<RelationRef> = OnceLock::new();
    Arc::clone(ORDERS.get_or_init(|| Relation::new("public.orders", &["id"])))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    /// A user not yet persisted.
    pub fn unsaved(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl Entity for User {
    fn relation() -> RelationRef {
        users()
    }

    fn primary_key(&self) -> Option<Key> {
        self.id.map(Key::Int)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

impl Team {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Entity for Team {
    fn relation() -> RelationRef {
        teams()
    }

    fn primary_key(&self) -> Option<Key> {
        Some(Key::Int(self.id))
    }
}

/// An order placed by a user, optionally on behalf of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub team_id: Option<i64>,
    pub total_cents: i64,
}

impl Order {
    pub fn new(id: i64, user_id: i64) -> Self {
        Self {
            id,
            user_id,
            team_id: None,
            total_cents: id * 100,
        }
    }

    pub fn for_team(mut self, team_id: i64) -> Self {
        self.team_id = Some(team_id);
        self
    }
}

impl Entity for Order {
    fn relation() -> RelationRef {
        orders()
    }

    fn primary_key(&self) -> Option<Key> {
        Some(Key::Int(self.id))
    }
}

/// `orders.user_id -> users.id`
pub fn order_user() -> AssociationRef {
    static ASSOC: OnceLock<AssociationRef> = OnceLock::new();
    Arc::clone(ASSOC.get_or_init(|| {
        Association::new::<Order, User, _>("orders.user_id", |o| Some(Key::Int(o.user_id)))
    }))
}

/// `orders.team_id -> teams.id`
pub fn order_team() -> AssociationRef {
    static ASSOC: OnceLock<AssociationRef> = OnceLock::new();
    Arc::clone(ASSOC.get_or_init(|| {
        Association::new::<Order, Team, _>("orders.team_id", |o| o.team_id.map(Key::Int))
    }))
}

// ============================================================================
// SUPPLIERS
// ============================================================================

/// Counts how many times the suppliers it hands out were invoked.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Supplier returning `value`.
    pub fn supplier<T>(&self, value: T) -> impl FnOnce() -> OrmaResult<T> {
        let calls = Arc::clone(&self.calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    }

    /// Supplier failing with a load error for `relation`.
    pub fn failing<T>(&self, relation: &str) -> impl FnOnce() -> OrmaResult<T> {
        let calls = Arc::clone(&self.calls);
        let relation = relation.to_string();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LoadError::Failed {
                relation,
                reason: "storage unreachable".to_string(),
            }
            .into())
        }
    }
}

// ============================================================================
// FAILURE INJECTION
// ============================================================================

/// Memory engine whose operations fail while failure injection is on.
#[derive(Debug, Default)]
pub struct FailingEngine {
    inner: MemoryEngine,
    failing: AtomicBool,
}

impl FailingEngine {
    /// Engine that starts out failing.
    pub fn new() -> Self {
        let engine = Self::default();
        engine.set_failing(true);
        engine
    }

    /// Engine that starts out healthy.
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::Other("injected engine failure".to_string()));
        }
        Ok(())
    }
}

impl CacheEngine for FailingEngine {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn get(&self, key: &RegionScopedKey) -> Result<Option<Vec<u8>>, EngineError> {
        self.check()?;
        self.inner.get(key)
    }

    fn put(&self, key: &RegionScopedKey, value: &[u8]) -> Result<(), EngineError> {
        self.check()?;
        self.inner.put(key, value)
    }

    fn remove(&self, key: &RegionScopedKey) -> Result<bool, EngineError> {
        self.check()?;
        self.inner.remove(key)
    }

    fn clear_region(&self, region: &str) -> Result<u64, EngineError> {
        self.check()?;
        self.inner.clear_region(region)
    }

    fn stats(&self) -> Result<EngineStats, EngineError> {
        self.check()?;
        self.inner.stats()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for keys and fixture entities.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a scalar key.
    pub fn arb_scalar_key() -> impl Strategy<Value = Key> {
        prop_oneof![
            any::<i64>().prop_map(Key::Int),
            "[a-zA-Z0-9_-]{0,24}".prop_map(Key::Text),
            any::<[u8; 16]>().prop_map(|b| Key::Uuid(Uuid::from_bytes(b))),
        ]
    }

    /// Generate any key, composite keys nested at most two levels.
    pub fn arb_key() -> impl Strategy<Value = Key> {
        arb_scalar_key().prop_recursive(2, 8, 4, |inner| {
            prop::collection::vec(inner, 1..4).prop_map(Key::Composite)
        })
    }

    /// Generate a persisted user.
    pub fn arb_user() -> impl Strategy<Value = User> {
        (any::<i64>(), "[a-z]{1,12}").prop_map(|(id, name)| User::new(id, name))
    }

    /// Generate an order of `user_id`.
    pub fn arb_order(user_id: i64) -> impl Strategy<Value = Order> {
        (any::<i64>(), proptest::option::of(any::<i64>())).prop_map(move |(id, team)| Order {
            id,
            user_id,
            team_id: team,
            total_cents: 0,
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache error variants.

    use super::*;

    /// Assert that a result failed because a cache region was unavailable.
    #[track_caller]
    pub fn assert_unavailable<T: std::fmt::Debug>(result: &OrmaResult<T>) {
        match result {
            Err(OrmaError::Cache(CacheError::Unavailable { .. })) => {}
            other => panic!("Expected Unavailable cache error, got: {:?}", other),
        }
    }

    /// Assert that a result failed in a supplier.
    #[track_caller]
    pub fn assert_load_error<T: std::fmt::Debug>(result: &OrmaResult<T>) {
        match result {
            Err(OrmaError::Load(_)) => {}
            other => panic!("Expected Load error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
