//! LMDB-backed engine.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped
//! key-value store shared by every application cache region.
//!
//! # Region Isolation
//!
//! All operations use `RegionScopedKey`, so:
//! - Entries of different regions are stored under different key prefixes
//! - Clearing a region only touches that region's prefix
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The engine uses read transactions for
//! `get` and write transactions for `put`, `remove` and `clear_region`.

use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::engine::{CacheEngine, EngineError, EngineStats};
use super::region_key::RegionScopedKey;

/// LMDB engine.
///
/// # Example
///
/// ```ignore
/// use orma_cache::application::{CacheEngine, LmdbEngine, RegionScopedKey};
/// use orma_core::Key;
///
/// let engine = LmdbEngine::new("/tmp/orma-cache", 100)?;
/// let key = RegionScopedKey::new("public.users", Key::Int(1))?;
/// engine.put(&key, b"payload")?;
/// assert!(engine.get(&key)?.is_some());
/// ```
pub struct LmdbEngine {
    env: Env,
    db: Database<Bytes, Bytes>,
    path: PathBuf,
}

impl LmdbEngine {
    /// Open (or create) an environment.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, EngineError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this engine
        // and never opened twice in the same process through it.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| EngineError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| EngineError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "opened LMDB cache engine");

        Ok(Self {
            env,
            db,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Collect every key starting with `prefix`.
    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let iter = self
            .db
            .prefix_iter(&rtxn, prefix)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let mut keys = Vec::new();
        for result in iter {
            let (key, _) = result.map_err(|e| EngineError::Transaction(e.to_string()))?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }
}

impl CacheEngine for LmdbEngine {
    fn name(&self) -> &'static str {
        "lmdb"
    }

    fn get(&self, key: &RegionScopedKey) -> Result<Option<Vec<u8>>, EngineError> {
        let encoded = key.encode();
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let value = self
            .db
            .get(&rtxn, &encoded)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn put(&self, key: &RegionScopedKey, value: &[u8]) -> Result<(), EngineError> {
        let encoded = key.encode();
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, &encoded, value)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| EngineError::Transaction(e.to_string()))
    }

    fn remove(&self, key: &RegionScopedKey) -> Result<bool, EngineError> {
        let encoded = key.encode();
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, &encoded)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;
        Ok(deleted)
    }

    fn clear_region(&self, region: &str) -> Result<u64, EngineError> {
        let Some(prefix) = RegionScopedKey::region_prefix(region) else {
            return Ok(0);
        };
        let keys_to_delete = self.collect_keys_with_prefix(&prefix)?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in &keys_to_delete {
            if self
                .db
                .delete(&mut wtxn, key)
                .map_err(|e| EngineError::Transaction(e.to_string()))?
            {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;
        Ok(deleted)
    }

    fn stats(&self) -> Result<EngineStats, EngineError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| EngineError::Transaction(e.to_string()))?;

        let mut stats = EngineStats::default();
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| EngineError::Transaction(e.to_string()))?;
        for result in iter {
            let (key, value) = result.map_err(|e| EngineError::Transaction(e.to_string()))?;
            stats.entry_count += 1;
            stats.size_bytes += (key.len() + value.len()) as u64;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orma_core::Key;
    use tempfile::TempDir;

    fn create_test_engine() -> (LmdbEngine, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let engine = LmdbEngine::new(temp_dir.path(), 10).expect("engine creation should succeed");
        (engine, temp_dir)
    }

    fn key(region: &str, id: i64) -> RegionScopedKey {
        RegionScopedKey::new(region, Key::Int(id)).expect("key should fit")
    }

    #[test]
    fn test_put_and_get() {
        let (engine, _temp_dir) = create_test_engine();
        engine.put(&key("public.users", 1), b"alice").expect("put should succeed");

        let value = engine.get(&key("public.users", 1)).expect("get should succeed");
        assert_eq!(value, Some(b"alice".to_vec()));
        assert!(engine.path().exists());
    }

    #[test]
    fn test_get_nonexistent() {
        let (engine, _temp_dir) = create_test_engine();
        let value = engine.get(&key("public.users", 42)).expect("get should succeed");
        assert!(value.is_none());
    }

    #[test]
    fn test_remove() {
        let (engine, _temp_dir) = create_test_engine();
        engine.put(&key("public.users", 1), b"alice").expect("put should succeed");

        assert!(engine.remove(&key("public.users", 1)).expect("remove should succeed"));
        assert!(!engine.remove(&key("public.users", 1)).expect("remove should succeed"));
        assert!(engine
            .get(&key("public.users", 1))
            .expect("get should succeed")
            .is_none());
    }

    #[test]
    fn test_region_isolation() {
        let (engine, _temp_dir) = create_test_engine();
        engine.put(&key("public.users", 1), b"user").expect("put should succeed");

        let other = engine.get(&key("public.orders", 1)).expect("get should succeed");
        assert!(other.is_none(), "orders region must not see users entries");
    }

    #[test]
    fn test_clear_region() {
        let (engine, _temp_dir) = create_test_engine();
        for id in 0..5 {
            engine.put(&key("public.users", id), b"u").expect("put should succeed");
        }
        engine.put(&key("public.users_archive", 1), b"a").expect("put should succeed");
        engine.put(&key("public.orders", 1), b"o").expect("put should succeed");

        let deleted = engine.clear_region("public.users").expect("clear should succeed");
        assert_eq!(deleted, 5);

        assert!(engine
            .get(&key("public.users_archive", 1))
            .expect("get should succeed")
            .is_some());
        assert!(engine
            .get(&key("public.orders", 1))
            .expect("get should succeed")
            .is_some());
    }

    #[test]
    fn test_overwrite() {
        let (engine, _temp_dir) = create_test_engine();
        engine.put(&key("public.users", 1), b"v1").expect("put should succeed");
        engine.put(&key("public.users", 1), b"v2").expect("put should succeed");

        let value = engine.get(&key("public.users", 1)).expect("get should succeed");
        assert_eq!(value, Some(b"v2".to_vec()));
        assert_eq!(engine.stats().expect("stats should succeed").entry_count, 1);
    }

    #[test]
    fn test_stats() {
        let (engine, _temp_dir) = create_test_engine();
        engine.put(&key("public.users", 1), b"abc").expect("put should succeed");
        engine.put(&key("public.orders", 2), b"de").expect("put should succeed");

        let stats = engine.stats().expect("stats should succeed");
        assert_eq!(stats.entry_count, 2);
        assert!(stats.size_bytes > 5);
        assert_eq!(stats.evictions, 0);
    }
}
