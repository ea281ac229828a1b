//! The partition manager handle.
//!
//! `PartitionManager` ties the pieces together: the host engine, the lock
//! coordinator, the per-process catalog cache, the callback registry, and
//! the migration task registry. It is cheaply clonable (`Arc`-based) and
//! `Send + Sync`; every session holds a clone.
//!
//! Structural operations follow one shape: acquire the parent's structural
//! lock, run the whole DDL body as a single engine transaction inside the
//! lock's publish window, then mark the lock committed and invalidate the
//! cache. Routed DML takes only the parent's read lock, so ordinary
//! sessions never serialize against each other.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::cache::CatalogCache;
use crate::callback::CallbackRegistry;
use crate::catalog::ops as catalog_ops;
use crate::catalog::{PartitionBounds, PartitionedTableConfig};
use crate::config::ManagerOptions;
use crate::ddl;
use crate::encoding;
use crate::engine::{MemoryEngine, RelationReader, Transaction};
use crate::error::{EngineError, MigrationError, Result, StateError, ValidationError};
use crate::lock::LockCoordinator;
use crate::migration::{self, MigrationPhase, MigrationProgress, MigrationTask, TaskRegistry};
use crate::routing::{self, RouteResult};
use crate::types::{KeyType, KeyValue, PartitionStrategy, RelationId};

/// One row of the partition listing.
#[derive(Debug, Clone)]
pub struct PartitionListing {
    pub parent: String,
    pub partition: String,
    pub bounds: PartitionBounds,
    pub tablespace: Option<String>,
    pub is_foreign: bool,
}

/// One row of the active-migration listing.
#[derive(Debug, Clone)]
pub struct MigrationTaskInfo {
    pub parent: String,
    pub progress: MigrationProgress,
}

struct ManagerInner {
    engine: MemoryEngine,
    locks: LockCoordinator,
    cache: CatalogCache,
    callbacks: CallbackRegistry,
    tasks: TaskRegistry,
    options: ManagerOptions,
}

/// The embedding handle for the partitioning core.
#[derive(Clone)]
pub struct PartitionManager {
    inner: Arc<ManagerInner>,
}

impl PartitionManager {
    /// Wrap an engine with default options.
    pub fn new(engine: MemoryEngine) -> Result<Self> {
        Self::with_options(engine, ManagerOptions::default())
    }

    /// Wrap an engine, bootstrapping the catalog's system relations.
    pub fn with_options(engine: MemoryEngine, options: ManagerOptions) -> Result<Self> {
        engine.transact(catalog_ops::bootstrap)?;
        Ok(Self {
            inner: Arc::new(ManagerInner {
                engine,
                locks: LockCoordinator::new(),
                cache: CatalogCache::new(),
                callbacks: CallbackRegistry::new(),
                tasks: TaskRegistry::new(),
                options,
            }),
        })
    }

    /// A manager over a fresh in-memory engine.
    pub fn in_memory() -> Result<Self> {
        Self::new(MemoryEngine::new())
    }

    pub fn engine(&self) -> &MemoryEngine {
        &self.inner.engine
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.inner.options
    }

    /// Register an init callback under `name` so parents can reference it
    /// via [`set_init_callback`](Self::set_init_callback).
    pub fn register_init_callback<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        self.inner.callbacks.register(name, handler);
    }

    // ------------------------------------------------------------------
    // Plain tables
    // ------------------------------------------------------------------

    pub fn create_table(&self, name: &str) -> Result<()> {
        self.inner.engine.transact(|txn| {
            txn.create_relation(name, None, false)?;
            Ok(())
        })
    }

    pub fn create_table_in(&self, name: &str, tablespace: &str) -> Result<()> {
        self.inner.engine.transact(|txn| {
            txn.create_relation(name, Some(tablespace.to_string()), false)?;
            Ok(())
        })
    }

    pub fn create_foreign_table(&self, name: &str) -> Result<()> {
        self.inner.engine.transact(|txn| {
            txn.create_relation(name, None, true)?;
            Ok(())
        })
    }

    /// Tablespace of a relation, `None` when it has no explicit one.
    pub fn get_tablespace(&self, relation: &str) -> Result<Option<String>> {
        let snap = self.inner.engine.snapshot();
        let meta = snap
            .relation_by_name(relation)
            .ok_or_else(|| EngineError::RelationNotFound(relation.to_string()))?;
        Ok(meta.tablespace)
    }

    fn resolve(&self, name: &str) -> Result<RelationId> {
        self.inner
            .engine
            .snapshot()
            .relation_by_name(name)
            .map(|m| m.id)
            .ok_or_else(|| EngineError::RelationNotFound(name.to_string()).into())
    }

    /// Parent id of a partition, resolved through the committed catalog.
    fn resolve_parent_of(&self, partition: &str) -> Result<(RelationId, RelationId)> {
        let id = self.resolve(partition)?;
        let snap = self.inner.engine.snapshot();
        let entry = catalog_ops::get_entry(&snap, id)?
            .ok_or_else(|| StateError::PartitionNotFound(partition.to_string()))?;
        Ok((entry.parent, id))
    }

    /// Run `f` as a structural change on `parent`: exclusive lock, one
    /// transaction inside the publish window, cache invalidation after
    /// commit.
    fn structural<R, F>(&self, parent: RelationId, parent_name: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Transaction) -> Result<R>,
    {
        let guard = self.inner.locks.acquire_structural(
            parent,
            parent_name,
            self.inner.options.lock_timeout,
        )?;
        let result = guard.publish(|| self.inner.engine.transact(f));
        match result {
            Ok(value) => {
                guard.commit();
                self.inner.cache.invalidate(parent);
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    fn names_of(txn: &Transaction, ids: &[RelationId]) -> Result<Vec<String>> {
        ids.iter().map(|&id| Ok(txn.relation(id)?.name)).collect()
    }

    // ------------------------------------------------------------------
    // Partition DDL
    // ------------------------------------------------------------------

    pub fn create_range_partitions(
        &self,
        parent: &str,
        key_column: &str,
        start: KeyValue,
        interval: i64,
        count: Option<usize>,
        partition_data: bool,
    ) -> Result<Vec<String>> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            let children = ddl::create_range_partitions(
                txn,
                &self.inner.callbacks,
                parent_id,
                key_column,
                start,
                interval,
                count,
                partition_data,
            )?;
            Self::names_of(txn, &children)
        })
    }

    pub fn create_range_partitions_with_bounds(
        &self,
        parent: &str,
        key_column: &str,
        bounds: &[(KeyValue, KeyValue)],
        partition_data: bool,
    ) -> Result<Vec<String>> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            let children = ddl::create_range_partitions_with_bounds(
                txn,
                &self.inner.callbacks,
                parent_id,
                key_column,
                bounds,
                partition_data,
            )?;
            Self::names_of(txn, &children)
        })
    }

    pub fn create_hash_partitions(
        &self,
        parent: &str,
        key_column: &str,
        key_type: KeyType,
        count: u32,
        partition_data: bool,
    ) -> Result<Vec<String>> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            let children = ddl::create_hash_partitions(
                txn,
                &self.inner.callbacks,
                parent_id,
                key_column,
                key_type,
                count,
                partition_data,
            )?;
            Self::names_of(txn, &children)
        })
    }

    pub fn append_range_partition(
        &self,
        parent: &str,
        name: Option<&str>,
        tablespace: Option<&str>,
    ) -> Result<String> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            let child = ddl::append_range_partition(
                txn,
                &self.inner.callbacks,
                parent_id,
                name,
                tablespace.map(str::to_string),
            )?;
            Ok(txn.relation(child)?.name)
        })
    }

    pub fn prepend_range_partition(
        &self,
        parent: &str,
        name: Option<&str>,
        tablespace: Option<&str>,
    ) -> Result<String> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            let child = ddl::prepend_range_partition(
                txn,
                &self.inner.callbacks,
                parent_id,
                name,
                tablespace.map(str::to_string),
            )?;
            Ok(txn.relation(child)?.name)
        })
    }

    pub fn add_range_partition(
        &self,
        parent: &str,
        start: KeyValue,
        end: KeyValue,
        name: Option<&str>,
        tablespace: Option<&str>,
    ) -> Result<String> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            let child = ddl::add_range_partition(
                txn,
                &self.inner.callbacks,
                parent_id,
                start,
                end,
                name,
                tablespace.map(str::to_string),
            )?;
            Ok(txn.relation(child)?.name)
        })
    }

    pub fn split_range_partition(
        &self,
        partition: &str,
        at: KeyValue,
        name: Option<&str>,
        tablespace: Option<&str>,
    ) -> Result<String> {
        let (parent_id, partition_id) = self.resolve_parent_of(partition)?;
        let parent_name = self.relation_name(parent_id)?;
        self.structural(parent_id, &parent_name, |txn| {
            let child = ddl::split_range_partition(
                txn,
                &self.inner.callbacks,
                partition_id,
                at,
                name,
                tablespace.map(str::to_string),
            )?;
            Ok(txn.relation(child)?.name)
        })
    }

    pub fn merge_range_partitions(&self, p1: &str, p2: &str) -> Result<()> {
        let (parent_id, left) = self.resolve_parent_of(p1)?;
        let right = self.resolve(p2)?;
        let parent_name = self.relation_name(parent_id)?;
        self.structural(parent_id, &parent_name, |txn| {
            ddl::merge_range_partitions(txn, left, right)
        })
    }

    pub fn attach_range_partition(
        &self,
        parent: &str,
        relation: &str,
        start: KeyValue,
        end: KeyValue,
    ) -> Result<()> {
        let parent_id = self.resolve(parent)?;
        let relation_id = self.resolve(relation)?;
        self.structural(parent_id, parent, |txn| {
            ddl::attach_range_partition(
                txn,
                &self.inner.callbacks,
                parent_id,
                relation_id,
                start,
                end,
            )
        })
    }

    pub fn detach_range_partition(&self, partition: &str) -> Result<()> {
        let (parent_id, partition_id) = self.resolve_parent_of(partition)?;
        let parent_name = self.relation_name(parent_id)?;
        self.structural(parent_id, &parent_name, |txn| {
            ddl::detach_range_partition(txn, partition_id)
        })
    }

    pub fn replace_hash_partition(&self, old: &str, new: &str) -> Result<()> {
        let (parent_id, old_id) = self.resolve_parent_of(old)?;
        let new_id = self.resolve(new)?;
        let parent_name = self.relation_name(parent_id)?;
        self.structural(parent_id, &parent_name, |txn| {
            ddl::replace_hash_partition(txn, old_id, new_id)
        })
    }

    pub fn drop_partitions(&self, parent: &str, cascade: bool) -> Result<usize> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            ddl::drop_partitions(txn, parent_id, cascade)
        })
    }

    pub fn enable_parent(&self, parent: &str) -> Result<()> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            ddl::set_enable_parent(txn, parent_id, true)
        })
    }

    pub fn disable_parent(&self, parent: &str) -> Result<()> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            ddl::set_enable_parent(txn, parent_id, false)
        })
    }

    pub fn set_init_callback(&self, parent: &str, callback: Option<&str>) -> Result<()> {
        let parent_id = self.resolve(parent)?;
        self.structural(parent_id, parent, |txn| {
            ddl::set_init_callback(txn, &self.inner.callbacks, parent_id, callback)
        })
    }

    fn relation_name(&self, id: RelationId) -> Result<String> {
        Ok(self.inner.engine.snapshot().relation(id)?.name)
    }

    // ------------------------------------------------------------------
    // Routed DML
    // ------------------------------------------------------------------

    /// Insert a document. Partitioned parents route by the partition key;
    /// a key outside current range coverage triggers auto-extension (when
    /// enabled), re-using a concurrent session's freshly created partition
    /// instead of spawning a duplicate.
    pub fn insert(&self, parent: &str, doc: Value) -> Result<()> {
        let parent_id = self.resolve(parent)?;
        match self.try_insert_routed(parent_id, parent, &doc)? {
            None => Ok(()),
            Some(key) => {
                self.extend_for(parent_id, parent, &key)?;
                match self.try_insert_routed(parent_id, parent, &doc)? {
                    None => Ok(()),
                    Some(key) => Err(ValidationError::ValueOutOfCoverage {
                        parent: parent.to_string(),
                        value: key.to_string(),
                    }
                    .into()),
                }
            }
        }
    }

    /// Attempt a routed insert. Returns `Some(key)` when the key is not
    /// covered and auto-extension should run.
    fn try_insert_routed(
        &self,
        parent_id: RelationId,
        parent: &str,
        doc: &Value,
    ) -> Result<Option<KeyValue>> {
        let auto_extend = self.inner.options.auto_extend;
        let _read = self.inner.locks.read(parent_id);
        self.inner.engine.transact(|txn| {
            // Read-through cache keyed by the config's version token; the
            // transaction never stages catalog changes, so the snapshot it
            // caches is committed state.
            let Some(view) = self.inner.cache.load(txn, parent_id)? else {
                // Unpartitioned table: plain append to its own storage.
                let row_id = txn.allocate_row_id();
                txn.put_row(
                    parent_id,
                    encoding::encode_bare_row_key(row_id),
                    row_id,
                    doc.clone(),
                )?;
                return Ok(None);
            };
            let key = routing::key_from_doc(doc, &view.config.key_column, view.config.key_type)?;
            match routing::route(&view, &key)? {
                RouteResult::Partition(child) => {
                    let row_id = txn.allocate_row_id();
                    let row_key = encoding::encode_row_key(&key, row_id)?;
                    txn.put_row(child, row_key, row_id, doc.clone())?;
                    Ok(None)
                }
                RouteResult::OutOfRange => {
                    if auto_extend && view.config.strategy == PartitionStrategy::Range {
                        Ok(Some(key))
                    } else {
                        Err(ValidationError::ValueOutOfCoverage {
                            parent: parent.to_string(),
                            value: key.to_string(),
                        }
                        .into())
                    }
                }
            }
        })
    }

    /// Auto-extension: take the structural lock, re-check routing under it
    /// (another session may have extended already), and spawn the missing
    /// partitions if still uncovered.
    fn extend_for(&self, parent_id: RelationId, parent: &str, key: &KeyValue) -> Result<()> {
        let created = self.structural(parent_id, parent, |txn| {
            ddl::spawn_partitions_for(txn, &self.inner.callbacks, parent_id, key)
        })?;
        if !created.is_empty() {
            tracing::info!(
                parent,
                count = created.len(),
                key = %key,
                "auto-extended range coverage"
            );
        }
        Ok(())
    }

    /// Merge `patch`'s fields into every row whose partition key equals
    /// `key`, in partitions and in parent-only storage alike. Returns the
    /// number of rows updated.
    pub fn update_where(&self, parent: &str, key: &KeyValue, patch: &Value) -> Result<usize> {
        self.for_each_matching(parent, key, |txn, relation, row_key, doc| {
            let merged = merge_patch(doc, patch);
            txn.update_row(relation, row_key, merged)
        })
    }

    /// Delete every row whose partition key equals `key`. Returns the
    /// number of rows deleted.
    pub fn delete_where(&self, parent: &str, key: &KeyValue) -> Result<usize> {
        self.for_each_matching(parent, key, |txn, relation, row_key, _doc| {
            txn.delete_row(relation, row_key)
        })
    }

    fn for_each_matching<F>(&self, parent: &str, key: &KeyValue, mut apply: F) -> Result<usize>
    where
        F: FnMut(&mut Transaction, RelationId, &[u8], &Value) -> Result<()>,
    {
        let parent_id = self.resolve(parent)?;
        let _read = self.inner.locks.read(parent_id);
        self.inner.engine.transact(|txn| {
            let Some(view) = self.inner.cache.load(txn, parent_id)? else {
                return Err(StateError::NotPartitioned(parent.to_string()).into());
            };
            let mut touched = 0;

            // Rows already routed into a partition share a key prefix.
            if let RouteResult::Partition(child) = routing::route(&view, key)? {
                let prefix = encoding::encode_key(key)?;
                for (row_key, row) in txn.scan_prefix(child, &prefix)? {
                    apply(txn, child, &row_key, &row.doc)?;
                    touched += 1;
                }
            }

            // Rows still in the parent's own storage (not yet migrated).
            for (row_key, row) in txn.scan(parent_id, None)? {
                let matches = KeyValue::from_json(
                    row.doc.get(&view.config.key_column).unwrap_or(&Value::Null),
                    view.config.key_type,
                )
                .is_some_and(|kv| &kv == key);
                if matches {
                    apply(txn, parent_id, &row_key, &row.doc)?;
                    touched += 1;
                }
            }
            Ok(touched)
        })
    }

    // ------------------------------------------------------------------
    // Reads and introspection
    // ------------------------------------------------------------------

    /// All rows reachable through the parent: its partitions in catalog
    /// order, preceded by the parent's own storage when `enable_parent` is
    /// set. Unpartitioned tables scan their own storage.
    pub fn scan(&self, parent: &str) -> Result<Vec<Value>> {
        let parent_id = self.resolve(parent)?;
        let snap = self.inner.engine.snapshot();
        let Some(view) = self.inner.cache.load(&snap, parent_id)? else {
            return Ok(snap
                .scan(parent_id, None)?
                .into_iter()
                .map(|(_, row)| row.doc)
                .collect());
        };
        let mut out = Vec::new();
        if view.config.enable_parent {
            out.extend(snap.scan(parent_id, None)?.into_iter().map(|(_, r)| r.doc));
        }
        for entry in &view.entries {
            out.extend(snap.scan(entry.child, None)?.into_iter().map(|(_, r)| r.doc));
        }
        Ok(out)
    }

    /// Rows in the parent's own storage only (the `FROM ONLY parent` view).
    pub fn scan_only_parent(&self, parent: &str) -> Result<Vec<Value>> {
        let parent_id = self.resolve(parent)?;
        let snap = self.inner.engine.snapshot();
        Ok(snap
            .scan(parent_id, None)?
            .into_iter()
            .map(|(_, row)| row.doc)
            .collect())
    }

    pub fn count(&self, parent: &str) -> Result<usize> {
        Ok(self.scan(parent)?.len())
    }

    pub fn count_only_parent(&self, parent: &str) -> Result<usize> {
        let parent_id = self.resolve(parent)?;
        self.inner.engine.snapshot().row_count(parent_id)
    }

    /// The parent's configuration row, if it is partitioned.
    pub fn partition_config(&self, parent: &str) -> Result<Option<PartitionedTableConfig>> {
        let parent_id = self.resolve(parent)?;
        catalog_ops::get_config(&self.inner.engine.snapshot(), parent_id)
    }

    /// Catalog listing: one row per partition, for one parent or for all.
    pub fn partition_list(&self, parent: Option<&str>) -> Result<Vec<PartitionListing>> {
        let snap = self.inner.engine.snapshot();
        let entries = match parent {
            Some(name) => catalog_ops::entries_for_parent(&snap, self.resolve(name)?)?,
            None => catalog_ops::all_entries(&snap)?,
        };
        entries
            .into_iter()
            .map(|entry| {
                Ok(PartitionListing {
                    parent: catalog_ops::relation_display(&snap, entry.parent),
                    partition: catalog_ops::relation_display(&snap, entry.child),
                    bounds: entry.bounds,
                    tablespace: entry.tablespace,
                    is_foreign: entry.is_foreign,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Concurrent migration
    // ------------------------------------------------------------------

    /// Start a background worker that drains the parent's own storage into
    /// its partitions in bounded batches. Returns once the worker is
    /// registered; observers poll [`migration_tasks`](Self::migration_tasks)
    /// until the task disappears.
    pub fn partition_table_concurrently(
        &self,
        parent: &str,
        batch_size: Option<usize>,
        sleep_between_batches: Option<Duration>,
    ) -> Result<()> {
        let parent_id = self.resolve(parent)?;
        let snap = self.inner.engine.snapshot();
        if catalog_ops::get_config(&snap, parent_id)?.is_none() {
            return Err(StateError::NotPartitioned(parent.to_string()).into());
        }

        let task = self.inner.tasks.begin(parent_id, parent)?;
        let batch_size = batch_size.unwrap_or(self.inner.options.migration_batch_size);
        let sleep = sleep_between_batches.unwrap_or(self.inner.options.migration_sleep);

        let manager = self.clone();
        let worker_task = task.clone();
        let spawned = thread::Builder::new()
            .name(format!("partwise-migrate-{parent}"))
            .spawn(move || manager.run_migration(worker_task, batch_size, sleep));
        if let Err(e) = spawned {
            self.inner.tasks.remove(parent_id);
            return Err(MigrationError::WorkerSpawn(e.to_string()).into());
        }
        Ok(())
    }

    fn run_migration(&self, task: Arc<MigrationTask>, batch_size: usize, sleep: Duration) {
        let parent = task.parent();
        task.update(|p| p.phase = MigrationPhase::Running);
        tracing::info!(parent = task.parent_name(), "migration worker started");

        loop {
            if task.is_cancelled() {
                tracing::info!(parent = task.parent_name(), "migration worker cancelled");
                self.inner.tasks.remove(parent);
                return;
            }
            let outcome = migration::migrate_batch(
                &self.inner.engine,
                &self.inner.locks,
                &self.inner.cache,
                parent,
                batch_size,
                self.inner.options.migration_max_retries,
            );
            match outcome {
                Ok(outcome) if outcome.moved == 0 => {
                    task.update(|p| {
                        p.phase = MigrationPhase::Finished;
                        p.remaining_estimate = 0;
                    });
                    self.inner.tasks.remove(parent);
                    tracing::info!(parent = task.parent_name(), "migration finished");
                    return;
                }
                Ok(outcome) => {
                    task.update(|p| {
                        p.rows_moved += outcome.moved as u64;
                        p.remaining_estimate = outcome.remaining as u64;
                        if outcome.last_key.is_some() {
                            p.last_key = outcome.last_key.clone();
                        }
                        if outcome.moved < batch_size {
                            p.phase = MigrationPhase::Draining;
                        }
                    });
                    if !sleep.is_zero() {
                        thread::sleep(sleep);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        parent = task.parent_name(),
                        error = %e,
                        "migration task halted"
                    );
                    // The task stays registered in its error state so
                    // observers can see why it halted.
                    task.update(|p| {
                        p.phase = MigrationPhase::Failed;
                        p.error = Some(e.to_string());
                    });
                    return;
                }
            }
        }
    }

    /// Ask the parent's migration worker to stop after its current batch.
    /// Returns `false` when no task is registered. A halted (failed) task
    /// is removed immediately.
    pub fn stop_migration(&self, parent: &str) -> Result<bool> {
        let parent_id = self.resolve(parent)?;
        let Some(task) = self.inner.tasks.get(parent_id) else {
            return Ok(false);
        };
        if task.progress().phase == MigrationPhase::Failed {
            self.inner.tasks.remove(parent_id);
        } else {
            task.cancel();
        }
        Ok(true)
    }

    /// Active migration tasks (including halted ones reporting an error).
    pub fn migration_tasks(&self) -> Vec<MigrationTaskInfo> {
        self.inner
            .tasks
            .active()
            .into_iter()
            .map(|task| MigrationTaskInfo {
                parent: task.parent_name().to_string(),
                progress: task.progress(),
            })
            .collect()
    }
}

/// Object-merge `patch` into `doc`; a non-object patch replaces the
/// document.
fn merge_patch(doc: &Value, patch: &Value) -> Value {
    match (doc, patch) {
        (Value::Object(base), Value::Object(fields)) => {
            let mut merged = base.clone();
            for (k, v) in fields {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}
