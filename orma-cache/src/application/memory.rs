//! In-process engine on a concurrent map.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::engine::{CacheEngine, EngineError, EngineStats};
use super::region_key::RegionScopedKey;

#[derive(Debug, Default)]
struct RegionEntries {
    entries: HashMap<Vec<u8>, Vec<u8>>,
    /// Insertion order, used for FIFO eviction when capped.
    order: VecDeque<Vec<u8>>,
}

impl RegionEntries {
    fn size_bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

/// Memory engine.
///
/// Regions are independent shards of a `DashMap`, so operations on different
/// regions never contend. With a per-region capacity, inserting a new key
/// into a full region drops that region's oldest entry.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    regions: DashMap<String, RegionEntries>,
    max_entries_per_region: Option<usize>,
    evictions: AtomicU64,
}

impl MemoryEngine {
    /// Unbounded engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine keeping at most `max_entries` per region. A cap of zero is
    /// treated as one.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries_per_region: Some(max_entries.max(1)),
            ..Self::default()
        }
    }

    pub fn max_entries_per_region(&self) -> Option<usize> {
        self.max_entries_per_region
    }

    /// Number of entries stored in `region`.
    pub fn region_len(&self, region: &str) -> usize {
        self.regions
            .get(region)
            .map(|r| r.entries.len())
            .unwrap_or(0)
    }
}

impl CacheEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &RegionScopedKey) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self
            .regions
            .get(key.region())
            .and_then(|r| r.entries.get(&key.encode()).cloned()))
    }

    fn put(&self, key: &RegionScopedKey, value: &[u8]) -> Result<(), EngineError> {
        let encoded = key.encode();
        let mut region = self.regions.entry(key.region().to_string()).or_default();

        if region.entries.insert(encoded.clone(), value.to_vec()).is_none() {
            region.order.push_back(encoded);
        }

        if let Some(cap) = self.max_entries_per_region {
            while region.entries.len() > cap {
                let Some(oldest) = region.order.pop_front() else {
                    break;
                };
                if region.entries.remove(&oldest).is_some() {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(region = %key.region(), "memory engine evicted oldest entry");
                }
            }
        }
        Ok(())
    }

    fn remove(&self, key: &RegionScopedKey) -> Result<bool, EngineError> {
        let Some(mut region) = self.regions.get_mut(key.region()) else {
            return Ok(false);
        };
        let encoded = key.encode();
        let removed = region.entries.remove(&encoded).is_some();
        if removed {
            region.order.retain(|k| k != &encoded);
        }
        Ok(removed)
    }

    fn clear_region(&self, region: &str) -> Result<u64, EngineError> {
        Ok(self
            .regions
            .remove(region)
            .map(|(_, r)| r.entries.len() as u64)
            .unwrap_or(0))
    }

    fn stats(&self) -> Result<EngineStats, EngineError> {
        let mut stats = EngineStats {
            evictions: self.evictions.load(Ordering::Relaxed),
            ..EngineStats::default()
        };
        for region in self.regions.iter() {
            stats.entry_count += region.entries.len() as u64;
            stats.size_bytes += region.size_bytes();
        }
        Ok(stats)
    }
}
