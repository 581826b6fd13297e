//! Identity types for cached entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Primary-key value of a record.
///
/// Composite keys keep their column order; two composite keys are equal only
/// when every component is equal in the same position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Int(i64),
    Text(String),
    Uuid(Uuid),
    Composite(Vec<Key>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{}", v),
            Key::Text(v) => write!(f, "{:?}", v),
            Key::Uuid(v) => write!(f, "{}", v),
            Key::Composite(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", part)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(i64::from(v))
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Text(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Text(v.to_string())
    }
}

impl From<Uuid> for Key {
    fn from(v: Uuid) -> Self {
        Key::Uuid(v)
    }
}

impl From<Vec<Key>> for Key {
    fn from(parts: Vec<Key>) -> Self {
        Key::Composite(parts)
    }
}

/// Key component of an [`EntityIdentity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    Persisted(Key),
    /// Instance token for a record without a primary key. Never persisted.
    Transient(Uuid),
}

/// "This relation + this primary-key value".
///
/// A record that has not been persisted yet gets a freshly generated UUIDv7
/// token instead of a key, so two unidentified records never compare equal.
/// The token lives in this value only: computing the identity of the same
/// unidentified record twice yields two unequal identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityIdentity {
    relation: Arc<str>,
    key: IdentityKey,
}

impl EntityIdentity {
    /// Build an identity from a relation name and an optional primary key.
    pub fn new(relation: impl Into<Arc<str>>, key: Option<Key>) -> Self {
        let key = match key {
            Some(key) => IdentityKey::Persisted(key),
            None => IdentityKey::Transient(Uuid::now_v7()),
        };
        Self {
            relation: relation.into(),
            key,
        }
    }

    /// Qualified name of the relation.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// The primary key, or `None` for an unidentified record.
    pub fn key(&self) -> Option<&Key> {
        match &self.key {
            IdentityKey::Persisted(key) => Some(key),
            IdentityKey::Transient(_) => None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self.key, IdentityKey::Persisted(_))
    }
}

impl fmt::Display for EntityIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            IdentityKey::Persisted(key) => write!(f, "{}#{}", self.relation, key),
            IdentityKey::Transient(token) => write!(f, "{}#<unsaved {}>", self.relation, token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_same_relation_same_key_equal() {
        let a = EntityIdentity::new("users", Some(Key::Int(1)));
        let b = EntityIdentity::new("users", Some(Key::Int(1)));
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_different_relation_not_equal() {
        let a = EntityIdentity::new("users", Some(Key::Int(1)));
        let b = EntityIdentity::new("orders", Some(Key::Int(1)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_unidentified_never_equal() {
        let a = EntityIdentity::new("users", None);
        let b = EntityIdentity::new("users", None);
        assert_ne!(a, b);
        assert!(!a.is_persisted());
        assert!(a.key().is_none());
        // A copy of the same identity value is still itself.
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_unidentified_not_equal_to_persisted() {
        let a = EntityIdentity::new("users", None);
        let b = EntityIdentity::new("users", Some(Key::Int(1)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::Int(7).to_string(), "7");
        assert_eq!(Key::from("abc").to_string(), "\"abc\"");
        assert_eq!(
            Key::Composite(vec![Key::Int(1), Key::from("x")]).to_string(),
            "(1, \"x\")"
        );
        let identity = EntityIdentity::new("users", Some(Key::Int(3)));
        assert_eq!(identity.to_string(), "users#3");
    }

    #[test]
    fn test_composite_order_matters() {
        let a = Key::Composite(vec![Key::Int(1), Key::Int(2)]);
        let b = Key::Composite(vec![Key::Int(2), Key::Int(1)]);
        assert_ne!(a, b);
    }
}
