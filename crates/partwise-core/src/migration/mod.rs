//! Concurrent migration: draining a freshly-partitioned parent's own
//! storage into its partitions in bounded batches.
//!
//! Each batch is one short transaction: snapshot-read a key-ordered slice
//! of parent rows, then re-check every row's version, insert it into its
//! routed partition, and delete it from the parent. A row rewritten since
//! the snapshot read fails the version check, aborting the batch, which is
//! then retried with a fresh read; a half-applied batch is never visible
//! and no row is ever moved twice. Readers and writers of already-migrated
//! partitions are blocked for at most one batch's publish window.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::cache::CatalogCache;
use crate::encoding;
use crate::engine::{MemoryEngine, RelationReader};
use crate::error::{EngineError, Error, MigrationError, Result, StateError, ValidationError};
use crate::lock::LockCoordinator;
use crate::routing::{self, RouteResult};
use crate::types::{KeyValue, RelationId};

/// Lifecycle of one migration task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    NotStarted,
    Running,
    /// The last batch came back short; the worker is finishing the tail.
    Draining,
    Finished,
    /// Batch retries were exhausted; the task halted and reports its error.
    Failed,
}

/// Externally visible progress of a task.
#[derive(Debug, Clone)]
pub struct MigrationProgress {
    pub phase: MigrationPhase,
    pub rows_moved: u64,
    pub remaining_estimate: u64,
    pub last_key: Option<KeyValue>,
    pub error: Option<String>,
}

/// One active migration. Lives in the registry while its worker runs;
/// deleted when the parent's own storage is drained.
pub struct MigrationTask {
    parent: RelationId,
    parent_name: String,
    progress: Mutex<MigrationProgress>,
    cancel: AtomicBool,
}

impl MigrationTask {
    fn new(parent: RelationId, parent_name: &str) -> Self {
        Self {
            parent,
            parent_name: parent_name.to_string(),
            progress: Mutex::new(MigrationProgress {
                phase: MigrationPhase::NotStarted,
                rows_moved: 0,
                remaining_estimate: 0,
                last_key: None,
                error: None,
            }),
            cancel: AtomicBool::new(false),
        }
    }

    pub fn parent(&self) -> RelationId {
        self.parent
    }

    pub fn parent_name(&self) -> &str {
        &self.parent_name
    }

    pub fn progress(&self) -> MigrationProgress {
        self.progress.lock().clone()
    }

    /// Ask the worker to stop; checked between batches.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut MigrationProgress),
    {
        f(&mut self.progress.lock());
    }
}

/// The set of active migration tasks, at most one per parent. External
/// observers poll this set: an empty set means migration is complete.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<RelationId, Arc<MigrationTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task for `parent`, failing if one is already active.
    pub fn begin(&self, parent: RelationId, parent_name: &str) -> Result<Arc<MigrationTask>> {
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&parent) {
            return Err(StateError::MigrationAlreadyRunning(parent_name.to_string()).into());
        }
        let task = Arc::new(MigrationTask::new(parent, parent_name));
        tasks.insert(parent, task.clone());
        Ok(task)
    }

    /// Delete a task (finished or cancelled).
    pub fn remove(&self, parent: RelationId) {
        self.tasks.lock().remove(&parent);
    }

    pub fn get(&self, parent: RelationId) -> Option<Arc<MigrationTask>> {
        self.tasks.lock().get(&parent).cloned()
    }

    /// All registered tasks, in no particular order.
    pub fn active(&self) -> Vec<Arc<MigrationTask>> {
        self.tasks.lock().values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

/// Result of one migration batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Rows moved by this batch; 0 means the parent storage is drained.
    pub moved: usize,
    /// Rows still left in the parent's own storage afterwards.
    pub remaining: usize,
    /// Key of the last row this batch moved.
    pub last_key: Option<KeyValue>,
}

/// Move one batch of parent-stored rows into their partitions.
///
/// Routing uses a freshly built catalog view inside the batch transaction,
/// so structural changes interleaved between batches (a split, a merge) are
/// honored. Conflicting batches are retried up to `max_retries` times with
/// the row set re-read; exhaustion is fatal for the task only.
pub fn migrate_batch(
    engine: &MemoryEngine,
    locks: &LockCoordinator,
    cache: &CatalogCache,
    parent: RelationId,
    batch_size: usize,
    max_retries: usize,
) -> Result<BatchOutcome> {
    let mut attempts = 0;
    loop {
        let snap = engine.snapshot();
        let parent_name = snap.relation(parent)?.name;
        let Some(view) = cache.load(&snap, parent)? else {
            return Err(StateError::NotPartitioned(parent_name).into());
        };

        let rows = snap.scan(parent, Some(batch_size))?;
        if rows.is_empty() {
            return Ok(BatchOutcome {
                moved: 0,
                remaining: 0,
                last_key: None,
            });
        }
        let last_key = rows
            .last()
            .and_then(|(_, row)| {
                routing::key_from_doc(&row.doc, &view.config.key_column, view.config.key_type)
                    .ok()
            });

        let read_guard = locks.read(parent);
        let result = engine.transact(|txn| {
            // Re-resolve the catalog inside the batch transaction so a
            // split or merge interleaved since the snapshot read is
            // honored.
            let Some(current) = cache.load(txn, parent)? else {
                return Err(StateError::NotPartitioned(parent_name.clone()).into());
            };
            for (key, row) in &rows {
                txn.delete_row_versioned(parent, key, row.version)
                    .map_err(|e| match e {
                        Error::Engine(
                            EngineError::VersionMismatch { .. } | EngineError::RowNotFound(_),
                        ) => MigrationError::BatchConflict {
                            parent: parent_name.clone(),
                            row_id: row.row_id,
                        }
                        .into(),
                        other => other,
                    })?;
                let kv = routing::key_from_doc(
                    &row.doc,
                    &current.config.key_column,
                    current.config.key_type,
                )?;
                match routing::route(&current, &kv)? {
                    RouteResult::Partition(child) => {
                        let new_key = encoding::encode_row_key(&kv, row.row_id)?;
                        txn.put_row(child, new_key, row.row_id, row.doc.clone())?;
                    }
                    RouteResult::OutOfRange => {
                        return Err(ValidationError::ValueOutOfCoverage {
                            parent: parent_name.clone(),
                            value: kv.to_string(),
                        }
                        .into());
                    }
                }
            }
            Ok(rows.len())
        });
        drop(read_guard);

        match result {
            Ok(moved) => {
                let remaining = engine.snapshot().row_count(parent)?;
                return Ok(BatchOutcome {
                    moved,
                    remaining,
                    last_key,
                });
            }
            Err(Error::Migration(MigrationError::BatchConflict { parent, row_id })) => {
                attempts += 1;
                tracing::debug!(
                    parent = %parent,
                    row_id,
                    attempts,
                    "migration batch conflicted, retrying with re-read rows"
                );
                if attempts >= max_retries {
                    return Err(MigrationError::RetriesExhausted { parent, attempts }.into());
                }
            }
            Err(e) => return Err(e),
        }
    }
}
