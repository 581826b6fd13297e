//! Error types for ORMA operations

use thiserror::Error;

/// Record cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The backing engine of a shared region failed. Distinct from a miss.
    #[error("Cache unavailable for region {region}: {reason}")]
    Unavailable { region: String, reason: String },

    #[error("Relation mismatch: key belongs to {expected}, record belongs to {actual}")]
    RelationMismatch { expected: String, actual: String },

    #[error("Association mismatch on {association}: expected children of {expected}, got {actual}")]
    AssociationMismatch {
        association: String,
        expected: String,
        actual: String,
    },

    #[error("Cached value for {relation} is not a {expected}")]
    TypeMismatch {
        relation: String,
        expected: &'static str,
    },

    #[error("Failed to encode entry for region {region}: {reason}")]
    Encoding { region: String, reason: String },

    #[error("Failed to decode entry for region {region}: {reason}")]
    Decoding { region: String, reason: String },

    #[error("Application caching already enabled for {relation}")]
    AlreadyEnabled { relation: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

impl CacheError {
    /// Whether this error reports an engine failure that callers may
    /// treat as a miss.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CacheError::Unavailable { .. })
    }
}

/// Lifecycle hook errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Handler for {mutation} on {relation} failed: {reason}")]
    HandlerFailed {
        relation: String,
        mutation: String,
        reason: String,
    },

    #[error("Lifecycle hook registry lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown implementation {name} for setting {setting}")]
    UnknownImplementation { setting: String, name: String },
}

/// Errors raised by suppliers while loading from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Load failed for {relation}: {reason}")]
    Failed { relation: String, reason: String },
}

/// Master error type for all ORMA errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrmaError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

/// Result type alias for ORMA operations.
pub type OrmaResult<T> = Result<T, OrmaError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display_unavailable() {
        let err = CacheError::Unavailable {
            region: "public.users".to_string(),
            reason: "map full".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Cache unavailable"));
        assert!(msg.contains("public.users"));
        assert!(msg.contains("map full"));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_cache_error_display_relation_mismatch() {
        let err = CacheError::RelationMismatch {
            expected: "users".to_string(),
            actual: "orders".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("users"));
        assert!(msg.contains("orders"));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_lifecycle_error_display() {
        let err = LifecycleError::HandlerFailed {
            relation: "users".to_string(),
            mutation: "delete".to_string(),
            reason: "engine down".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("delete"));
        assert!(msg.contains("engine down"));
    }

    #[test]
    fn test_config_error_display_unknown_implementation() {
        let err = ConfigError::UnknownImplementation {
            setting: "ORMA_CONTEXT_CACHE".to_string(),
            name: "redis".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ORMA_CONTEXT_CACHE"));
        assert!(msg.contains("redis"));
    }

    #[test]
    fn test_orma_error_from_variants() {
        let cache = OrmaError::from(CacheError::LockPoisoned);
        assert!(matches!(cache, OrmaError::Cache(_)));

        let config = OrmaError::from(ConfigError::MissingRequired {
            field: "lmdb_path".to_string(),
        });
        assert!(matches!(config, OrmaError::Config(_)));

        let load = OrmaError::from(LoadError::Failed {
            relation: "users".to_string(),
            reason: "connection reset".to_string(),
        });
        assert!(matches!(load, OrmaError::Load(_)));

        let lifecycle = OrmaError::from(LifecycleError::HandlerFailed {
            relation: "users".to_string(),
            mutation: "insert".to_string(),
            reason: "x".to_string(),
        });
        assert!(matches!(lifecycle, OrmaError::Lifecycle(_)));
    }
}
