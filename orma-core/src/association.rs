//! Directed child → parent relationships (foreign keys).

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::{CacheError, Entity, Key, RelationRef};

/// Shared handle to an association.
pub type AssociationRef = Arc<Association>;

type ParentKeyFn = dyn Fn(&(dyn Any + Send + Sync)) -> Option<Key> + Send + Sync;

/// A foreign key from a child relation to a parent relation.
///
/// Associations own no records. They key the inverse cache and filter it
/// during parent-scoped invalidation. Two associations are the same iff they
/// have the same name and child relation.
pub struct Association {
    name: Arc<str>,
    child: RelationRef,
    parent: RelationRef,
    parent_key_of: Box<ParentKeyFn>,
}

impl Association {
    /// Create an association from `C` to `P`.
    ///
    /// `parent_key` extracts the parent's primary key from a child; it returns
    /// `None` when the foreign key is null.
    pub fn new<C, P, F>(name: impl Into<Arc<str>>, parent_key: F) -> AssociationRef
    where
        C: Entity,
        P: Entity,
        F: Fn(&C) -> Option<Key> + Send + Sync + 'static,
    {
        let extract = move |child: &(dyn Any + Send + Sync)| {
            child.downcast_ref::<C>().and_then(&parent_key)
        };
        Arc::new(Self {
            name: name.into(),
            child: C::relation(),
            parent: P::relation(),
            parent_key_of: Box::new(extract),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relation holding the foreign key.
    pub fn child(&self) -> &RelationRef {
        &self.child
    }

    /// Relation the foreign key points at.
    pub fn parent(&self) -> &RelationRef {
        &self.parent
    }

    /// Fail fast when `C` is not this association's child type.
    pub fn ensure_child<C: Entity>(&self) -> Result<(), CacheError> {
        let actual = C::relation();
        if actual.name() != self.child.name() {
            return Err(CacheError::AssociationMismatch {
                association: self.name.to_string(),
                expected: self.child.name().to_string(),
                actual: actual.name().to_string(),
            });
        }
        Ok(())
    }

    /// Parent key a child points at.
    pub fn parent_key_of<C: Entity>(&self, child: &C) -> Result<Option<Key>, CacheError> {
        self.ensure_child::<C>()?;
        Ok((self.parent_key_of)(child))
    }
}

impl PartialEq for Association {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.child.name() == other.child.name()
    }
}

impl Eq for Association {}

impl Hash for Association {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.child.name().hash(state);
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("name", &self.name)
            .field("child", &self.child.name())
            .field("parent", &self.parent.name())
            .finish()
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.name, self.child.name(), self.parent.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Relation;
    use serde::{Deserialize, Serialize};
    use std::sync::OnceLock;

    fn teams() -> RelationRef {
        static TEAMS: OnceLock<RelationRef> = OnceLock::new();
        Arc::clone(TEAMS.get_or_init(|| Relation::new("test.teams", &["id"])))
    }

    fn players() -> RelationRef {
        static PLAYERS: OnceLock<RelationRef> = OnceLock::new();
        Arc::clone(PLAYERS.get_or_init(|| Relation::new("test.players", &["id"])))
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Team {
        id: i64,
    }

    impl Entity for Team {
        fn relation() -> RelationRef {
            teams()
        }
        fn primary_key(&self) -> Option<Key> {
            Some(Key::Int(self.id))
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Player {
        id: i64,
        team_id: Option<i64>,
    }

    impl Entity for Player {
        fn relation() -> RelationRef {
            players()
        }
        fn primary_key(&self) -> Option<Key> {
            Some(Key::Int(self.id))
        }
    }

    fn player_team() -> AssociationRef {
        Association::new::<Player, Team, _>("players.team_id", |p| p.team_id.map(Key::Int))
    }

    #[test]
    fn test_association_endpoints() {
        let assoc = player_team();
        assert_eq!(assoc.child().name(), "test.players");
        assert_eq!(assoc.parent().name(), "test.teams");
        assert_eq!(assoc.to_string(), "players.team_id (test.players -> test.teams)");
    }

    #[test]
    fn test_parent_key_extraction() {
        let assoc = player_team();
        let p = Player { id: 1, team_id: Some(4) };
        assert_eq!(assoc.parent_key_of(&p), Ok(Some(Key::Int(4))));

        let free_agent = Player { id: 2, team_id: None };
        assert_eq!(assoc.parent_key_of(&free_agent), Ok(None));
    }

    #[test]
    fn test_parent_key_rejects_wrong_child_type() {
        let assoc = player_team();
        let err = assoc.parent_key_of(&Team { id: 1 }).expect_err("should reject");
        assert!(matches!(err, CacheError::AssociationMismatch { .. }));
    }

    #[test]
    fn test_association_equality() {
        assert_eq!(*player_team(), *player_team());
        let other = Association::new::<Player, Team, _>("players.captain_of", |_| None);
        assert_ne!(*player_team(), *other);
    }
}
