//! Byte-level storage engine behind the application cache.

use orma_core::CacheError;

use super::region_key::RegionScopedKey;

/// Error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Failed to open or create the environment.
    #[error("Failed to open environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine lock poisoned")]
    LockPoisoned,

    /// Failure injected or reported by a custom engine.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Report this failure as an unavailable region.
    pub fn into_cache_error(self, region: &str) -> CacheError {
        CacheError::Unavailable {
            region: region.to_string(),
            reason: self.to_string(),
        }
    }
}

/// Usage counters of an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of entries currently stored.
    pub entry_count: u64,
    /// Approximate stored bytes (keys and values).
    pub size_bytes: u64,
    /// Entries dropped to respect a capacity limit.
    pub evictions: u64,
}

/// Storage engine shared by every application cache region.
///
/// Engines store opaque bytes under region-scoped keys; encoding and
/// statistics of hits and misses are the caller's concern. Implementations
/// must be safe for concurrent use.
pub trait CacheEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn get(&self, key: &RegionScopedKey) -> Result<Option<Vec<u8>>, EngineError>;

    /// Store `value`, replacing any previous entry.
    fn put(&self, key: &RegionScopedKey, value: &[u8]) -> Result<(), EngineError>;

    /// Remove one entry. Returns whether it existed.
    fn remove(&self, key: &RegionScopedKey) -> Result<bool, EngineError>;

    /// Remove every entry of `region`. Returns the number removed.
    fn clear_region(&self, region: &str) -> Result<u64, EngineError>;

    fn stats(&self) -> Result<EngineStats, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_maps_to_unavailable() {
        let err = EngineError::Transaction("MDB_MAP_FULL".into()).into_cache_error("public.users");
        assert!(err.is_unavailable());
        assert_eq!(
            err,
            CacheError::Unavailable {
                region: "public.users".into(),
                reason: "Transaction error: MDB_MAP_FULL".into(),
            }
        );
    }
}
