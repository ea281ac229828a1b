//! Host-engine surface: the transactional row store the partition manager
//! embeds into.
//!
//! The manager never assumes a concrete storage engine; it states its
//! requirements as the [`RelationReader`] trait (shared by transactions and
//! read snapshots) and mutation methods on the transaction type. The crate
//! ships one implementation, [`memory::MemoryEngine`], an in-memory engine
//! with single-writer transactions and O(1) snapshot isolation.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{RelationId, RowId, TxnId};

pub use memory::{MemoryEngine, Snapshot, Transaction};

/// Metadata of one relation (a table or a partition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMeta {
    pub id: RelationId,
    pub name: String,
    pub tablespace: Option<String>,
    pub is_foreign: bool,
}

/// A stored row: its id, the transaction that last wrote it, and the
/// document payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub row_id: RowId,
    pub version: TxnId,
    pub doc: serde_json::Value,
}

/// Read surface shared by transactions (over their staged state) and
/// snapshots (over committed state). All accessors return owned values so
/// callers can keep reading while they stage mutations.
pub trait RelationReader {
    /// Relation metadata by id.
    fn relation(&self, id: RelationId) -> Result<RelationMeta>;

    /// Relation metadata by name, `None` if no such relation.
    fn relation_by_name(&self, name: &str) -> Option<RelationMeta>;

    /// Exact row fetch by full row key.
    fn get_row(&self, relation: RelationId, key: &[u8]) -> Result<Option<StoredRow>>;

    /// Ordered scan of a relation (by encoded key, then row id), optionally
    /// bounded to the first `limit` rows.
    fn scan(&self, relation: RelationId, limit: Option<usize>)
    -> Result<Vec<(Vec<u8>, StoredRow)>>;

    /// Ordered scan of the rows whose row key starts with `prefix`.
    fn scan_prefix(&self, relation: RelationId, prefix: &[u8])
    -> Result<Vec<(Vec<u8>, StoredRow)>>;

    /// Number of rows stored in the relation.
    fn row_count(&self, relation: RelationId) -> Result<usize>;
}
