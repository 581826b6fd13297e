//! Configuration types

use crate::{ConfigError, OrmaResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Setting that selects the context cache implementation.
pub const CONTEXT_CACHE_SETTING: &str = "ORMA_CONTEXT_CACHE";

/// Name of the built-in context cache implementation.
pub const DEFAULT_CONTEXT_CACHE: &str = "default";

/// Name of the built-in implementation that caches nothing.
pub const DISABLED_CONTEXT_CACHE: &str = "disabled";

/// Backing engine for application-level caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process concurrent map
    Memory,
    /// Memory-mapped LMDB environment
    Lmdb,
}

impl EngineKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(EngineKind::Memory),
            "lmdb" => Some(EngineKind::Lmdb),
            _ => None,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Context cache implementation bound to each new context.
    pub context_cache: String,
    /// Engine backing the application tier.
    pub engine: EngineKind,
    /// LMDB directory (required for `EngineKind::Lmdb`).
    pub lmdb_path: Option<PathBuf>,
    /// LMDB map size in megabytes.
    pub lmdb_max_size_mb: usize,
    /// Per-region entry cap for the memory engine. `None` means unbounded.
    pub memory_max_entries_per_region: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            context_cache: DEFAULT_CONTEXT_CACHE.to_string(),
            engine: EngineKind::Memory,
            lmdb_path: None,
            lmdb_max_size_mb: 256,
            memory_max_entries_per_region: None,
        }
    }
}

impl CacheSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `ORMA_CONTEXT_CACHE`: Context cache implementation (default: "default")
    /// - `ORMA_CACHE_ENGINE`: `memory` or `lmdb` (default: memory)
    /// - `ORMA_LMDB_PATH`: LMDB directory
    /// - `ORMA_LMDB_MAX_SIZE_MB`: LMDB map size (default: 256)
    /// - `ORMA_MEMORY_MAX_ENTRIES`: Per-region cap for the memory engine (default: unbounded)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            context_cache: std::env::var(CONTEXT_CACHE_SETTING)
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.context_cache),
            engine: std::env::var("ORMA_CACHE_ENGINE")
                .ok()
                .and_then(|s| EngineKind::parse(&s))
                .unwrap_or(defaults.engine),
            lmdb_path: std::env::var("ORMA_LMDB_PATH")
                .ok()
                .map(PathBuf::from)
                .or(defaults.lmdb_path),
            lmdb_max_size_mb: std::env::var("ORMA_LMDB_MAX_SIZE_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.lmdb_max_size_mb),
            memory_max_entries_per_region: std::env::var("ORMA_MEMORY_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(defaults.memory_max_entries_per_region),
        }
    }

    /// Set the context cache implementation.
    pub fn with_context_cache(mut self, name: impl Into<String>) -> Self {
        self.context_cache = name.into();
        self
    }

    /// Use the memory engine with an optional per-region cap.
    pub fn with_memory_engine(mut self, max_entries_per_region: Option<usize>) -> Self {
        self.engine = EngineKind::Memory;
        self.memory_max_entries_per_region = max_entries_per_region;
        self
    }

    /// Use the LMDB engine.
    pub fn with_lmdb_engine(mut self, path: impl Into<PathBuf>, max_size_mb: usize) -> Self {
        self.engine = EngineKind::Lmdb;
        self.lmdb_path = Some(path.into());
        self.lmdb_max_size_mb = max_size_mb;
        self
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(OrmaError::Config) if invalid.
    ///
    /// Validates:
    /// - context_cache is not empty
    /// - lmdb_path is set when the engine is LMDB
    /// - lmdb_max_size_mb > 0
    /// - memory_max_entries_per_region, if set, is > 0
    pub fn validate(&self) -> OrmaResult<()> {
        if self.context_cache.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "context_cache".to_string(),
                value: self.context_cache.clone(),
                reason: "context_cache must name an implementation".to_string(),
            }
            .into());
        }

        if self.engine == EngineKind::Lmdb && self.lmdb_path.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "lmdb_path".to_string(),
            }
            .into());
        }

        if self.lmdb_max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "lmdb_max_size_mb".to_string(),
                value: self.lmdb_max_size_mb.to_string(),
                reason: "lmdb_max_size_mb must be greater than 0".to_string(),
            }
            .into());
        }

        if self.memory_max_entries_per_region == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "memory_max_entries_per_region".to_string(),
                value: "0".to_string(),
                reason: "memory_max_entries_per_region must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OrmaError;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = CacheSettings::default();
        assert_eq!(settings.context_cache, DEFAULT_CONTEXT_CACHE);
        assert_eq!(settings.engine, EngineKind::Memory);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_lmdb_requires_path() {
        let mut settings = CacheSettings::default();
        settings.engine = EngineKind::Lmdb;
        let err = settings.validate().expect_err("should require path");
        assert!(matches!(
            err,
            OrmaError::Config(ConfigError::MissingRequired { ref field }) if field == "lmdb_path"
        ));

        let settings = CacheSettings::new().with_lmdb_engine("/tmp/orma", 64);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_memory_cap_rejected() {
        let settings = CacheSettings::new().with_memory_engine(Some(0));
        assert!(settings.validate().is_err());
        let settings = CacheSettings::new().with_memory_engine(Some(10));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_context_cache_rejected() {
        let settings = CacheSettings::new().with_context_cache("  ");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!(EngineKind::parse("LMDB"), Some(EngineKind::Lmdb));
        assert_eq!(EngineKind::parse(" memory "), Some(EngineKind::Memory));
        assert_eq!(EngineKind::parse("redis"), None);
    }
}
