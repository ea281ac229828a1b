//! In-memory transactional engine.
//!
//! Committed state lives in persistent (structurally shared) maps, so a
//! snapshot is an O(1) clone that stays transaction-consistent no matter
//! what commits afterwards. Write transactions are serialized by a single
//! writer lock; a transaction mutates its own clone of the committed state
//! and the clone replaces the committed state atomically on commit. If the
//! transaction closure returns an error the clone is simply dropped
//! (auto-abort).

use std::sync::Arc;

use im::OrdMap;
use parking_lot::{Mutex, RwLock};

use crate::error::{EngineError, Error, Result};
use crate::types::{RelationId, RowId, TxnId};

use super::{RelationMeta, RelationReader, StoredRow};

#[derive(Clone, Default)]
struct EngineState {
    relations: OrdMap<RelationId, RelationMeta>,
    by_name: OrdMap<String, RelationId>,
    rows: OrdMap<RelationId, OrdMap<Vec<u8>, StoredRow>>,
    next_relation: u64,
    next_row: u64,
    txn_counter: TxnId,
}

impl EngineState {
    fn relation(&self, id: RelationId) -> Result<RelationMeta> {
        self.relations
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownRelation(id).into())
    }

    fn table(&self, id: RelationId) -> Result<&OrdMap<Vec<u8>, StoredRow>> {
        self.rows
            .get(&id)
            .ok_or_else(|| Error::from(EngineError::UnknownRelation(id)))
    }

    fn scan(&self, id: RelationId, limit: Option<usize>) -> Result<Vec<(Vec<u8>, StoredRow)>> {
        let table = self.table(id)?;
        let limit = limit.unwrap_or(usize::MAX);
        Ok(table
            .iter()
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn scan_prefix(&self, id: RelationId, prefix: &[u8]) -> Result<Vec<(Vec<u8>, StoredRow)>> {
        let table = self.table(id)?;
        Ok(table
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// A write transaction over a private clone of the committed state.
pub struct Transaction {
    state: EngineState,
    txn_id: TxnId,
}

impl Transaction {
    /// The id this transaction will commit under.
    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    /// Create a relation. The name must be unused.
    pub fn create_relation(
        &mut self,
        name: &str,
        tablespace: Option<String>,
        is_foreign: bool,
    ) -> Result<RelationId> {
        if self.state.by_name.contains_key(name) {
            return Err(EngineError::RelationExists(name.to_string()).into());
        }
        let id = RelationId(self.state.next_relation);
        self.state.next_relation += 1;
        self.state.relations.insert(
            id,
            RelationMeta {
                id,
                name: name.to_string(),
                tablespace,
                is_foreign,
            },
        );
        self.state.by_name.insert(name.to_string(), id);
        self.state.rows.insert(id, OrdMap::new());
        Ok(id)
    }

    /// Drop a relation and all of its rows.
    pub fn drop_relation(&mut self, id: RelationId) -> Result<()> {
        let meta = self.state.relation(id)?;
        self.state.relations.remove(&id);
        self.state.by_name.remove(&meta.name);
        self.state.rows.remove(&id);
        Ok(())
    }

    /// Allocate a fresh row id, unique across all relations of this engine.
    pub fn allocate_row_id(&mut self) -> RowId {
        let id = self.state.next_row;
        self.state.next_row += 1;
        id
    }

    /// Insert or overwrite a row under the given full row key. The row's
    /// version becomes this transaction's id.
    pub fn put_row(
        &mut self,
        relation: RelationId,
        key: Vec<u8>,
        row_id: RowId,
        doc: serde_json::Value,
    ) -> Result<()> {
        let version = self.txn_id;
        let table = self
            .state
            .rows
            .get_mut(&relation)
            .ok_or(EngineError::UnknownRelation(relation))?;
        table.insert(
            key,
            StoredRow {
                row_id,
                version,
                doc,
            },
        );
        Ok(())
    }

    /// Replace the document of an existing row, bumping its version.
    pub fn update_row(
        &mut self,
        relation: RelationId,
        key: &[u8],
        doc: serde_json::Value,
    ) -> Result<()> {
        let existing = self
            .get_row(relation, key)?
            .ok_or_else(|| self.row_not_found(relation))?;
        self.put_row(relation, key.to_vec(), existing.row_id, doc)
    }

    /// Delete a row by its full row key.
    pub fn delete_row(&mut self, relation: RelationId, key: &[u8]) -> Result<()> {
        let table = self
            .state
            .rows
            .get_mut(&relation)
            .ok_or(EngineError::UnknownRelation(relation))?;
        if table.remove(&key.to_vec()).is_none() {
            return Err(self.row_not_found(relation));
        }
        Ok(())
    }

    /// Delete a row only if its version still matches `expected`.
    ///
    /// This is the optimistic-concurrency hook the migration worker relies
    /// on: a row rewritten since the worker's snapshot read fails the check
    /// and aborts the batch instead of silently dropping the newer version.
    pub fn delete_row_versioned(
        &mut self,
        relation: RelationId,
        key: &[u8],
        expected: TxnId,
    ) -> Result<()> {
        let row = self
            .get_row(relation, key)?
            .ok_or_else(|| self.row_not_found(relation))?;
        if row.version != expected {
            return Err(EngineError::VersionMismatch {
                expected,
                actual: row.version,
            }
            .into());
        }
        self.delete_row(relation, key)
    }

    fn row_not_found(&self, relation: RelationId) -> Error {
        let name = self
            .state
            .relations
            .get(&relation)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| relation.to_string());
        EngineError::RowNotFound(name).into()
    }
}

impl RelationReader for Transaction {
    fn relation(&self, id: RelationId) -> Result<RelationMeta> {
        self.state.relation(id)
    }

    fn relation_by_name(&self, name: &str) -> Option<RelationMeta> {
        let id = self.state.by_name.get(name)?;
        self.state.relations.get(id).cloned()
    }

    fn get_row(&self, relation: RelationId, key: &[u8]) -> Result<Option<StoredRow>> {
        Ok(self.state.table(relation)?.get(&key.to_vec()).cloned())
    }

    fn scan(
        &self,
        relation: RelationId,
        limit: Option<usize>,
    ) -> Result<Vec<(Vec<u8>, StoredRow)>> {
        self.state.scan(relation, limit)
    }

    fn scan_prefix(
        &self,
        relation: RelationId,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, StoredRow)>> {
        self.state.scan_prefix(relation, prefix)
    }

    fn row_count(&self, relation: RelationId) -> Result<usize> {
        Ok(self.state.table(relation)?.len())
    }
}

/// A transaction-consistent read view of the committed state.
pub struct Snapshot {
    state: EngineState,
}

impl Snapshot {
    /// The id of the last transaction visible in this snapshot.
    pub fn txn_counter(&self) -> TxnId {
        self.state.txn_counter
    }
}

impl RelationReader for Snapshot {
    fn relation(&self, id: RelationId) -> Result<RelationMeta> {
        self.state.relation(id)
    }

    fn relation_by_name(&self, name: &str) -> Option<RelationMeta> {
        let id = self.state.by_name.get(name)?;
        self.state.relations.get(id).cloned()
    }

    fn get_row(&self, relation: RelationId, key: &[u8]) -> Result<Option<StoredRow>> {
        Ok(self.state.table(relation)?.get(&key.to_vec()).cloned())
    }

    fn scan(
        &self,
        relation: RelationId,
        limit: Option<usize>,
    ) -> Result<Vec<(Vec<u8>, StoredRow)>> {
        self.state.scan(relation, limit)
    }

    fn scan_prefix(
        &self,
        relation: RelationId,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, StoredRow)>> {
        self.state.scan_prefix(relation, prefix)
    }

    fn row_count(&self, relation: RelationId) -> Result<usize> {
        Ok(self.state.table(relation)?.len())
    }
}

struct EngineInner {
    state: RwLock<EngineState>,
    /// Serializes write transactions (single-writer model).
    writer: Mutex<()>,
}

/// The in-memory host engine. Cheaply clonable (`Arc`-based) and
/// `Send + Sync`; every clone shares the same committed state.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<EngineInner>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EngineInner {
                state: RwLock::new(EngineState::default()),
                writer: Mutex::new(()),
            }),
        }
    }

    /// Execute a write transaction.
    ///
    /// The closure receives a mutable [`Transaction`]. If it returns `Ok`,
    /// the staged state is committed atomically; if it returns `Err`, all
    /// staged changes are discarded and the error is returned.
    pub fn transact<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Transaction) -> Result<R>,
    {
        let _writer = self.inner.writer.lock();
        let base = self.inner.state.read().clone();
        let txn_id = base.txn_counter + 1;
        let mut txn = Transaction {
            state: base,
            txn_id,
        };
        let out = f(&mut txn)?;
        txn.state.txn_counter = txn_id;
        *self.inner.state.write() = txn.state;
        Ok(out)
    }

    /// Take an O(1) transaction-consistent snapshot of the committed state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.inner.state.read().clone(),
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}
