//! Partition catalog: per-parent configuration and per-partition entries.
//!
//! Catalog rows live in two reserved system relations inside the host
//! engine, keyed by relation id and stored as JSON-serialized structs, so
//! every catalog mutation commits (or vanishes) together with the relation
//! and row changes of its enclosing transaction.

pub mod ops;

use serde::{Deserialize, Serialize};

use crate::types::{KeyType, KeyValue, PartitionStrategy, RelationId};

/// Configuration of one partitioned parent table. Exactly one live row per
/// parent; the strategy is immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionedTableConfig {
    pub parent: RelationId,
    /// Name of the partition-key column in stored documents.
    pub key_column: String,
    pub key_type: KeyType,
    pub strategy: PartitionStrategy,
    /// Whether the parent's own storage still participates in reads.
    pub enable_parent: bool,
    /// Name of a registered callback invoked whenever a partition is
    /// created for this parent.
    pub init_callback: Option<String>,
    /// Hash modulus; 0 for range-partitioned parents.
    pub partition_count: u32,
    /// Cache-invalidation token. Monotonically increasing; bumped by every
    /// committed structural or configuration change for this parent, so
    /// updating the configuration row is itself the invalidation signal.
    pub version: u64,
}

/// Ownership claim of one partition: a range interval or a hash index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartitionBounds {
    /// Half-open interval `[min, max)`.
    Range { min: KeyValue, max: KeyValue },
    /// One residue of `hash(key) mod modulus`.
    Hash { index: u32 },
}

/// One partition of a parent table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionEntry {
    pub parent: RelationId,
    pub child: RelationId,
    pub bounds: PartitionBounds,
    pub tablespace: Option<String>,
    pub is_foreign: bool,
}

impl PartitionEntry {
    /// Range bounds, `None` for hash partitions.
    pub fn range(&self) -> Option<(&KeyValue, &KeyValue)> {
        match &self.bounds {
            PartitionBounds::Range { min, max } => Some((min, max)),
            PartitionBounds::Hash { .. } => None,
        }
    }

    /// Hash index, `None` for range partitions.
    pub fn hash_index(&self) -> Option<u32> {
        match &self.bounds {
            PartitionBounds::Hash { index } => Some(*index),
            PartitionBounds::Range { .. } => None,
        }
    }
}
