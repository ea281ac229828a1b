//! Per-process read-through cache of catalog state.
//!
//! Snapshots are keyed by parent and carry the configuration version they
//! were built from. A load compares the cached token against the committed
//! configuration row and rebuilds on mismatch, so readers never block each
//! other and staleness is bounded by one token check per access.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::ops as catalog_ops;
use crate::catalog::{PartitionBounds, PartitionEntry, PartitionedTableConfig};
use crate::engine::RelationReader;
use crate::error::Result;
use crate::types::{PartitionStrategy, RelationId};

/// An immutable view of one parent's catalog state: its configuration plus
/// entries sorted for routing.
#[derive(Debug)]
pub struct CacheSnapshot {
    pub config: PartitionedTableConfig,
    /// Entries sorted by range minimum (range) or hash index (hash).
    pub entries: Vec<PartitionEntry>,
    /// Hash routing table: slot index to owning child. Empty for range.
    pub by_index: Vec<Option<RelationId>>,
    /// The configuration version this snapshot was built from.
    pub token: u64,
}

impl CacheSnapshot {
    /// Build a snapshot from whatever catalog state `r` sees. Returns
    /// `None` when the parent is not partitioned in that view.
    pub fn build(r: &impl RelationReader, parent: RelationId) -> Result<Option<Arc<CacheSnapshot>>> {
        let Some(config) = catalog_ops::get_config(r, parent)? else {
            return Ok(None);
        };
        let entries = catalog_ops::entries_for_parent(r, parent)?;
        let by_index = match config.strategy {
            PartitionStrategy::Hash => {
                let mut slots = vec![None; config.partition_count as usize];
                for entry in &entries {
                    if let PartitionBounds::Hash { index } = entry.bounds
                        && let Some(slot) = slots.get_mut(index as usize)
                    {
                        *slot = Some(entry.child);
                    }
                }
                slots
            }
            PartitionStrategy::Range => Vec::new(),
        };
        let token = config.version;
        Ok(Some(Arc::new(CacheSnapshot {
            config,
            entries,
            by_index,
            token,
        })))
    }
}

/// The per-process cache. Shared by every session of one manager; the inner
/// mutex guards only the map itself, never a catalog read.
#[derive(Default)]
pub struct CatalogCache {
    snapshots: Mutex<HashMap<RelationId, Arc<CacheSnapshot>>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot for `parent`, reusing the cached one when its token
    /// matches the committed configuration version in `r`. Returns `None`
    /// (and forgets any stale snapshot) when the parent is not partitioned.
    pub fn load(
        &self,
        r: &impl RelationReader,
        parent: RelationId,
    ) -> Result<Option<Arc<CacheSnapshot>>> {
        let Some(config) = catalog_ops::get_config(r, parent)? else {
            self.snapshots.lock().remove(&parent);
            return Ok(None);
        };

        if let Some(cached) = self.snapshots.lock().get(&parent)
            && cached.token == config.version
        {
            return Ok(Some(cached.clone()));
        }

        let rebuilt = CacheSnapshot::build(r, parent)?;
        if let Some(ref snapshot) = rebuilt {
            self.snapshots.lock().insert(parent, snapshot.clone());
        }
        Ok(rebuilt)
    }

    /// Drop the cached snapshot for `parent`; the next load re-reads.
    pub fn invalidate(&self, parent: RelationId) {
        self.snapshots.lock().remove(&parent);
    }
}
