//! Partition DDL operation bodies.
//!
//! Every function here runs inside a caller-provided transaction and stages
//! the full structural change: relation creation/drop, catalog rows, row
//! movement, and init-callback invocation. Serialization against other
//! structural work is the caller's job (the manager wraps each call in a
//! structural lock); a returned error aborts the transaction with nothing
//! staged.

use serde_json::json;

use crate::cache::CacheSnapshot;
use crate::callback::CallbackRegistry;
use crate::catalog::ops as catalog_ops;
use crate::catalog::{PartitionBounds, PartitionEntry, PartitionedTableConfig};
use crate::encoding;
use crate::engine::{RelationReader, StoredRow, Transaction};
use crate::error::{Error, Result, StateError, ValidationError};
use crate::routing::{self, RouteResult};
use crate::types::{KeyType, KeyValue, PartitionStrategy, RelationId, MAX_AUTO_SPAWN};

/// Smallest unused `{parent}_{n}` name, searching upward from `n`.
fn next_partition_name(txn: &Transaction, parent_name: &str, mut n: u64) -> String {
    loop {
        let candidate = format!("{parent_name}_{n}");
        if txn.relation_by_name(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

/// The argument handed to an init callback for one new partition.
fn callback_arg(parent: &str, partition: &str, bounds: &PartitionBounds) -> serde_json::Value {
    match bounds {
        PartitionBounds::Range { min, max } => json!({
            "parent": parent,
            "partition": partition,
            "parttype": "range",
            "range_min": min.to_json(),
            "range_max": max.to_json(),
        }),
        PartitionBounds::Hash { .. } => json!({
            "parent": parent,
            "partition": partition,
            "parttype": "hash",
        }),
    }
}

fn invoke_init_callback(
    callbacks: &CallbackRegistry,
    config: &PartitionedTableConfig,
    parent_name: &str,
    partition_name: &str,
    bounds: &PartitionBounds,
) -> Result<()> {
    if let Some(name) = &config.init_callback {
        callbacks.invoke(name, &callback_arg(parent_name, partition_name, bounds))?;
    }
    Ok(())
}

/// Create one partition relation plus its catalog entry and fire the init
/// callback. A partition created without an explicit tablespace inherits
/// the parent's tablespace.
fn create_partition(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    config: &PartitionedTableConfig,
    name: Option<&str>,
    tablespace: Option<String>,
    bounds: PartitionBounds,
    default_index: u64,
) -> Result<RelationId> {
    let parent_meta = txn.relation(config.parent)?;
    let name = match name {
        Some(n) => n.to_string(),
        None => next_partition_name(txn, &parent_meta.name, default_index),
    };
    let tablespace = tablespace.or_else(|| parent_meta.tablespace.clone());
    let child = txn.create_relation(&name, tablespace.clone(), false)?;
    catalog_ops::insert_entry(
        txn,
        &PartitionEntry {
            parent: config.parent,
            child,
            bounds: bounds.clone(),
            tablespace,
            is_foreign: false,
        },
    )?;
    invoke_init_callback(callbacks, config, &parent_meta.name, &name, &bounds)?;
    Ok(child)
}

/// Scan a relation and pair every row with its extracted key value.
fn rows_with_keys(
    txn: &Transaction,
    relation: RelationId,
    key_column: &str,
    key_type: KeyType,
) -> Result<Vec<(Vec<u8>, StoredRow, KeyValue)>> {
    let mut out = Vec::new();
    for (key, row) in txn.scan(relation, None)? {
        let kv = routing::key_from_doc(&row.doc, key_column, key_type)?;
        out.push((key, row, kv));
    }
    Ok(out)
}

/// Like [`rows_with_keys`] but reports key extraction failures as an
/// incompatible schema (used when binding a pre-existing relation).
fn rows_with_keys_checked(
    txn: &Transaction,
    relation: RelationId,
    key_column: &str,
    key_type: KeyType,
) -> Result<Vec<(Vec<u8>, StoredRow, KeyValue)>> {
    rows_with_keys(txn, relation, key_column, key_type).map_err(|e| match e {
        Error::Validation(
            ValidationError::MissingKeyColumn(_) | ValidationError::KeyTypeMismatch { .. },
        ) => StateError::IncompatibleSchema {
            relation: catalog_ops::relation_display(txn, relation),
            column: key_column.to_string(),
        }
        .into(),
        other => other,
    })
}

/// Move one row between relations, re-keying it under its key value.
fn move_row(
    txn: &mut Transaction,
    from: RelationId,
    to: RelationId,
    old_key: &[u8],
    row: &StoredRow,
    kv: &KeyValue,
) -> Result<()> {
    let new_key = encoding::encode_row_key(kv, row.row_id)?;
    txn.delete_row(from, old_key)?;
    txn.put_row(to, new_key, row.row_id, row.doc.clone())
}

/// Route every row of `from` through the staged catalog and move it into
/// its partition.
fn redistribute_rows(
    txn: &mut Transaction,
    parent: RelationId,
    rows: Vec<(Vec<u8>, StoredRow, KeyValue)>,
) -> Result<()> {
    let Some(snapshot) = CacheSnapshot::build(txn, parent)? else {
        return Err(StateError::NotPartitioned(catalog_ops::relation_display(txn, parent)).into());
    };
    for (old_key, row, kv) in rows {
        let child = match routing::route(&snapshot, &kv)? {
            RouteResult::Partition(child) => child,
            RouteResult::OutOfRange => {
                return Err(ValidationError::ValueOutOfCoverage {
                    parent: catalog_ops::relation_display(txn, parent),
                    value: kv.to_string(),
                }
                .into());
            }
        };
        move_row(txn, parent, child, &old_key, &row, &kv)?;
    }
    Ok(())
}

/// Guard shared by the create operations: the target must exist and be
/// neither partitioned nor itself a partition.
fn check_creatable(txn: &Transaction, parent: RelationId) -> Result<String> {
    let meta = txn.relation(parent)?;
    if catalog_ops::get_config(txn, parent)?.is_some() {
        return Err(StateError::AlreadyPartitioned(meta.name).into());
    }
    if catalog_ops::get_entry(txn, parent)?.is_some() {
        return Err(StateError::AlreadyAPartition(meta.name).into());
    }
    Ok(meta.name)
}

/// Partition an existing (possibly non-empty) table into `count`
/// interval-width range partitions starting at `start`.
///
/// With `count = None` the count is derived from the data: enough
/// partitions to cover the largest present key. `partition_data` moves
/// existing rows into the new partitions in this same transaction;
/// otherwise they stay in the parent (which keeps serving reads via
/// `enable_parent`) for a later concurrent migration.
pub fn create_range_partitions(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    parent: RelationId,
    key_column: &str,
    start: KeyValue,
    interval: i64,
    count: Option<usize>,
    partition_data: bool,
) -> Result<Vec<RelationId>> {
    let parent_name = check_creatable(txn, parent)?;
    let KeyValue::Int(start_int) = start else {
        return Err(ValidationError::ComputedBoundsRequireIntKey.into());
    };
    if interval <= 0 {
        return Err(ValidationError::NonPositiveInterval(interval).into());
    }

    let rows = rows_with_keys(txn, parent, key_column, KeyType::Int)?;
    let mut max_key: Option<i64> = None;
    for (_, _, kv) in &rows {
        let KeyValue::Int(v) = kv else { continue };
        if *v < start_int {
            return Err(ValidationError::DataBelowStart {
                value: kv.to_string(),
                start: start.to_string(),
            }
            .into());
        }
        max_key = Some(max_key.map_or(*v, |m: i64| m.max(*v)));
    }

    let needed = match max_key {
        Some(max) => ((max - start_int) / interval) as usize + 1,
        None => 0,
    };
    let count = match count {
        Some(n) => {
            if n < needed.max(1) {
                return Err(ValidationError::NotEnoughPartitions {
                    needed: needed.max(1),
                }
                .into());
            }
            n
        }
        None if rows.is_empty() => {
            return Err(ValidationError::PartitionCountRequired(parent_name).into());
        }
        None => needed,
    };

    let config = PartitionedTableConfig {
        parent,
        key_column: key_column.to_string(),
        key_type: KeyType::Int,
        strategy: PartitionStrategy::Range,
        enable_parent: !partition_data && !rows.is_empty(),
        init_callback: None,
        partition_count: 0,
        version: 1,
    };
    catalog_ops::insert_config(txn, &config)?;

    let mut children = Vec::with_capacity(count);
    for i in 0..count {
        let min = start.offset_by(interval * i as i64)?;
        let max = start.offset_by(interval * (i as i64 + 1))?;
        children.push(create_partition(
            txn,
            callbacks,
            &config,
            None,
            None,
            PartitionBounds::Range { min, max },
            1,
        )?);
    }

    if partition_data {
        redistribute_rows(txn, parent, rows)?;
    }
    tracing::info!(parent = %parent_name, partitions = count, "created range partitions");
    Ok(children)
}

/// Partition an existing table into explicitly bounded range partitions
/// (the creation path for string keys, where interval arithmetic is not
/// available).
pub fn create_range_partitions_with_bounds(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    parent: RelationId,
    key_column: &str,
    bounds: &[(KeyValue, KeyValue)],
    partition_data: bool,
) -> Result<Vec<RelationId>> {
    let parent_name = check_creatable(txn, parent)?;
    let Some((first_min, _)) = bounds.first() else {
        return Err(ValidationError::NotEnoughPartitions { needed: 1 }.into());
    };
    let key_type = first_min.key_type();

    let rows = rows_with_keys(txn, parent, key_column, key_type)?;

    let config = PartitionedTableConfig {
        parent,
        key_column: key_column.to_string(),
        key_type,
        strategy: PartitionStrategy::Range,
        enable_parent: !partition_data && !rows.is_empty(),
        init_callback: None,
        partition_count: 0,
        version: 1,
    };
    catalog_ops::insert_config(txn, &config)?;

    let mut children = Vec::with_capacity(bounds.len());
    for (min, max) in bounds {
        children.push(create_partition(
            txn,
            callbacks,
            &config,
            None,
            None,
            PartitionBounds::Range {
                min: min.clone(),
                max: max.clone(),
            },
            1,
        )?);
    }

    if partition_data {
        redistribute_rows(txn, parent, rows)?;
    }
    tracing::info!(parent = %parent_name, partitions = bounds.len(), "created range partitions");
    Ok(children)
}

/// Partition an existing table into `count` hash partitions over
/// `hash(key) mod count`.
pub fn create_hash_partitions(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    parent: RelationId,
    key_column: &str,
    key_type: KeyType,
    count: u32,
    partition_data: bool,
) -> Result<Vec<RelationId>> {
    let parent_name = check_creatable(txn, parent)?;
    if count == 0 {
        return Err(ValidationError::NotEnoughPartitions { needed: 1 }.into());
    }

    let rows = rows_with_keys(txn, parent, key_column, key_type)?;

    let config = PartitionedTableConfig {
        parent,
        key_column: key_column.to_string(),
        key_type,
        strategy: PartitionStrategy::Hash,
        enable_parent: !partition_data && !rows.is_empty(),
        init_callback: None,
        partition_count: count,
        version: 1,
    };
    catalog_ops::insert_config(txn, &config)?;

    let mut children = Vec::with_capacity(count as usize);
    for index in 0..count {
        children.push(create_partition(
            txn,
            callbacks,
            &config,
            None,
            None,
            PartitionBounds::Hash { index },
            u64::from(index),
        )?);
    }

    if partition_data {
        redistribute_rows(txn, parent, rows)?;
    }
    tracing::info!(parent = %parent_name, partitions = count, "created hash partitions");
    Ok(children)
}

fn require_range_config(
    txn: &Transaction,
    parent: RelationId,
) -> Result<PartitionedTableConfig> {
    let config = catalog_ops::require_config(txn, parent)?;
    if config.strategy != PartitionStrategy::Range {
        return Err(StateError::StrategyMismatch {
            relation: catalog_ops::relation_display(txn, parent),
            expected: PartitionStrategy::Range.to_string(),
            actual: config.strategy.to_string(),
        }
        .into());
    }
    Ok(config)
}

/// Add one partition adjacent to the current maximum bound; its width is
/// copied from the last existing partition.
pub fn append_range_partition(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    parent: RelationId,
    name: Option<&str>,
    tablespace: Option<String>,
) -> Result<RelationId> {
    let config = require_range_config(txn, parent)?;
    let entries = catalog_ops::entries_for_parent(txn, parent)?;
    let Some((last_min, last_max)) = entries.last().and_then(|e| e.range()) else {
        return Err(StateError::NoPartitions(catalog_ops::relation_display(txn, parent)).into());
    };
    let width = last_min.distance_to(last_max)?;
    let min = last_max.clone();
    let max = last_max.offset_by(width)?;
    let child = create_partition(
        txn,
        callbacks,
        &config,
        name,
        tablespace,
        PartitionBounds::Range { min, max },
        entries.len() as u64 + 1,
    )?;
    catalog_ops::touch_config(txn, parent)?;
    Ok(child)
}

/// Add one partition adjacent to the current minimum bound; its width is
/// copied from the first existing partition.
pub fn prepend_range_partition(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    parent: RelationId,
    name: Option<&str>,
    tablespace: Option<String>,
) -> Result<RelationId> {
    let config = require_range_config(txn, parent)?;
    let entries = catalog_ops::entries_for_parent(txn, parent)?;
    let Some((first_min, first_max)) = entries.first().and_then(|e| e.range()) else {
        return Err(StateError::NoPartitions(catalog_ops::relation_display(txn, parent)).into());
    };
    let width = first_min.distance_to(first_max)?;
    let max = first_min.clone();
    let min = first_min.offset_by(-width)?;
    let child = create_partition(
        txn,
        callbacks,
        &config,
        name,
        tablespace,
        PartitionBounds::Range { min, max },
        entries.len() as u64 + 1,
    )?;
    catalog_ops::touch_config(txn, parent)?;
    Ok(child)
}

/// Add one partition with explicit bounds. The new interval may leave a
/// gap but must not overlap existing coverage.
pub fn add_range_partition(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    parent: RelationId,
    start: KeyValue,
    end: KeyValue,
    name: Option<&str>,
    tablespace: Option<String>,
) -> Result<RelationId> {
    let config = require_range_config(txn, parent)?;
    let index = catalog_ops::entries_for_parent(txn, parent)?.len() as u64 + 1;
    let child = create_partition(
        txn,
        callbacks,
        &config,
        name,
        tablespace,
        PartitionBounds::Range {
            min: start,
            max: end,
        },
        index,
    )?;
    catalog_ops::touch_config(txn, parent)?;
    Ok(child)
}

/// Split one partition at `at` into two contiguous partitions whose union
/// is the original interval. The original keeps `[min, at)`; rows at or
/// above the split point move into the new sibling.
pub fn split_range_partition(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    partition: RelationId,
    at: KeyValue,
    name: Option<&str>,
    tablespace: Option<String>,
) -> Result<RelationId> {
    let Some(entry) = catalog_ops::get_entry(txn, partition)? else {
        return Err(
            StateError::PartitionNotFound(catalog_ops::relation_display(txn, partition)).into(),
        );
    };
    let config = require_range_config(txn, entry.parent)?;
    let Some((min, max)) = entry.range() else {
        return Err(StateError::StrategyMismatch {
            relation: catalog_ops::relation_display(txn, entry.parent),
            expected: PartitionStrategy::Range.to_string(),
            actual: config.strategy.to_string(),
        }
        .into());
    };
    if at.key_type() != config.key_type {
        return Err(ValidationError::KeyTypeMismatch {
            column: config.key_column.clone(),
            expected: config.key_type.to_string(),
            actual: at.key_type().to_string(),
        }
        .into());
    }
    if &at <= min || &at >= max {
        return Err(ValidationError::SplitPointOutOfBounds {
            at: at.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
        .into());
    }
    let (min, max) = (min.clone(), max.clone());

    // Shrink the original first so the new sibling's bounds validate
    // cleanly against it.
    let mut shrunk = entry.clone();
    shrunk.bounds = PartitionBounds::Range {
        min: min.clone(),
        max: at.clone(),
    };
    catalog_ops::update_entry(txn, &shrunk)?;

    let sibling = create_partition(
        txn,
        callbacks,
        &config,
        name,
        tablespace.or_else(|| entry.tablespace.clone()),
        PartitionBounds::Range {
            min: at.clone(),
            max,
        },
        catalog_ops::entries_for_parent(txn, entry.parent)?.len() as u64 + 1,
    )?;

    for (old_key, row, kv) in
        rows_with_keys(txn, partition, &config.key_column, config.key_type)?
    {
        if kv >= at {
            move_row(txn, partition, sibling, &old_key, &row, &kv)?;
        }
    }

    catalog_ops::touch_config(txn, entry.parent)?;
    tracing::info!(partition = %catalog_ops::relation_display(txn, partition), at = %at, "split range partition");
    Ok(sibling)
}

/// Merge two adjacent partitions (`p1.max == p2.min`) into `p1`, which
/// afterwards spans the union. `p2`'s rows move into `p1` and its relation
/// is dropped.
pub fn merge_range_partitions(
    txn: &mut Transaction,
    p1: RelationId,
    p2: RelationId,
) -> Result<()> {
    let Some(left) = catalog_ops::get_entry(txn, p1)? else {
        return Err(StateError::PartitionNotFound(catalog_ops::relation_display(txn, p1)).into());
    };
    let Some(right) = catalog_ops::get_entry(txn, p2)? else {
        return Err(StateError::PartitionNotFound(catalog_ops::relation_display(txn, p2)).into());
    };
    if left.parent != right.parent {
        return Err(StateError::ParentMismatch {
            left: catalog_ops::relation_display(txn, p1),
            right: catalog_ops::relation_display(txn, p2),
        }
        .into());
    }
    let config = require_range_config(txn, left.parent)?;
    let (Some((left_min, left_max)), Some((right_min, right_max))) =
        (left.range(), right.range())
    else {
        return Err(StateError::StrategyMismatch {
            relation: catalog_ops::relation_display(txn, left.parent),
            expected: PartitionStrategy::Range.to_string(),
            actual: config.strategy.to_string(),
        }
        .into());
    };
    if left_max != right_min {
        return Err(ValidationError::NotAdjacent {
            left: catalog_ops::relation_display(txn, p1),
            right: catalog_ops::relation_display(txn, p2),
        }
        .into());
    }
    let merged_bounds = PartitionBounds::Range {
        min: left_min.clone(),
        max: right_max.clone(),
    };

    // Move the right-hand rows into the survivor; row keys already encode
    // the key value, so they carry over unchanged.
    for (key, row) in txn.scan(p2, None)? {
        txn.put_row(p1, key, row.row_id, row.doc)?;
    }

    // Remove the right entry before widening the left one so the widened
    // bounds do not collide with it.
    catalog_ops::remove_entry(txn, p2)?;
    let mut widened = left.clone();
    widened.bounds = merged_bounds;
    catalog_ops::update_entry(txn, &widened)?;
    txn.drop_relation(p2)?;

    catalog_ops::touch_config(txn, left.parent)?;
    tracing::info!(survivor = %catalog_ops::relation_display(txn, p1), "merged range partitions");
    Ok(())
}

/// Bind an existing (possibly foreign) relation as a partition of
/// `parent` over `[start, end)`. Every existing row must carry the
/// partition key and fall inside the bounds.
pub fn attach_range_partition(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    parent: RelationId,
    relation: RelationId,
    start: KeyValue,
    end: KeyValue,
) -> Result<()> {
    let meta = txn.relation(relation)?;
    if catalog_ops::get_entry(txn, relation)?.is_some() {
        return Err(StateError::AlreadyAPartition(meta.name).into());
    }
    if catalog_ops::get_config(txn, relation)?.is_some() {
        return Err(StateError::AlreadyPartitioned(meta.name).into());
    }
    let config = require_range_config(txn, parent)?;

    let rows = rows_with_keys_checked(txn, relation, &config.key_column, config.key_type)?;
    for (_, _, kv) in &rows {
        if kv < &start || kv >= &end {
            return Err(ValidationError::RowOutOfBounds {
                value: kv.to_string(),
                min: start.to_string(),
                max: end.to_string(),
            }
            .into());
        }
    }
    // Re-key the rows so the relation scans like any other partition.
    for (old_key, row, kv) in rows {
        let new_key = encoding::encode_row_key(&kv, row.row_id)?;
        if new_key != old_key {
            txn.delete_row(relation, &old_key)?;
            txn.put_row(relation, new_key, row.row_id, row.doc)?;
        }
    }

    let bounds = PartitionBounds::Range {
        min: start,
        max: end,
    };
    catalog_ops::insert_entry(
        txn,
        &PartitionEntry {
            parent,
            child: relation,
            bounds: bounds.clone(),
            tablespace: meta.tablespace.clone(),
            is_foreign: meta.is_foreign,
        },
    )?;
    let parent_name = catalog_ops::relation_display(txn, parent);
    invoke_init_callback(callbacks, &config, &parent_name, &meta.name, &bounds)?;
    catalog_ops::touch_config(txn, parent)?;
    Ok(())
}

/// Unbind a range partition. The relation and its rows survive as a
/// standalone table.
pub fn detach_range_partition(txn: &mut Transaction, partition: RelationId) -> Result<()> {
    let Some(entry) = catalog_ops::get_entry(txn, partition)? else {
        return Err(
            StateError::PartitionNotFound(catalog_ops::relation_display(txn, partition)).into(),
        );
    };
    require_range_config(txn, entry.parent)?;
    catalog_ops::remove_entry(txn, partition)?;
    catalog_ops::touch_config(txn, entry.parent)?;
    Ok(())
}

/// Transfer ownership of a hash index from `old` to `new` atomically.
/// `old` becomes a standalone relation; no rows are moved.
pub fn replace_hash_partition(
    txn: &mut Transaction,
    old: RelationId,
    new: RelationId,
) -> Result<()> {
    let Some(entry) = catalog_ops::get_entry(txn, old)? else {
        return Err(StateError::PartitionNotFound(catalog_ops::relation_display(txn, old)).into());
    };
    let config = catalog_ops::require_config(txn, entry.parent)?;
    let Some(index) = entry.hash_index() else {
        return Err(StateError::StrategyMismatch {
            relation: catalog_ops::relation_display(txn, entry.parent),
            expected: PartitionStrategy::Hash.to_string(),
            actual: config.strategy.to_string(),
        }
        .into());
    };

    let new_meta = txn.relation(new)?;
    if catalog_ops::get_entry(txn, new)?.is_some() {
        return Err(StateError::AlreadyAPartition(new_meta.name).into());
    }
    if catalog_ops::get_config(txn, new)?.is_some() {
        return Err(StateError::AlreadyPartitioned(new_meta.name).into());
    }

    // Re-key the incoming rows (also proves the schema carries the key).
    let rows = rows_with_keys_checked(txn, new, &config.key_column, config.key_type)?;
    for (old_key, row, kv) in rows {
        let new_key = encoding::encode_row_key(&kv, row.row_id)?;
        if new_key != old_key {
            txn.delete_row(new, &old_key)?;
            txn.put_row(new, new_key, row.row_id, row.doc)?;
        }
    }

    catalog_ops::remove_entry(txn, old)?;
    catalog_ops::insert_entry(
        txn,
        &PartitionEntry {
            parent: entry.parent,
            child: new,
            bounds: PartitionBounds::Hash { index },
            tablespace: new_meta.tablespace.clone(),
            is_foreign: new_meta.is_foreign,
        },
    )?;
    catalog_ops::touch_config(txn, entry.parent)?;
    Ok(())
}

/// Remove all partition entries of `parent` and its configuration row.
/// With `cascade` the child relations (and their rows) are dropped too;
/// otherwise they survive as standalone tables. Returns the number of
/// partitions removed.
pub fn drop_partitions(txn: &mut Transaction, parent: RelationId, cascade: bool) -> Result<usize> {
    catalog_ops::require_config(txn, parent)?;
    let entries = catalog_ops::entries_for_parent(txn, parent)?;
    let count = entries.len();
    for entry in entries {
        catalog_ops::remove_entry(txn, entry.child)?;
        if cascade {
            txn.drop_relation(entry.child)?;
        }
    }
    catalog_ops::delete_config(txn, parent)?;
    tracing::info!(parent = %catalog_ops::relation_display(txn, parent), count, cascade, "dropped partitions");
    Ok(count)
}

/// Toggle whether the parent's own storage participates in reads.
pub fn set_enable_parent(txn: &mut Transaction, parent: RelationId, enabled: bool) -> Result<()> {
    let mut config = catalog_ops::require_config(txn, parent)?;
    config.enable_parent = enabled;
    config.version += 1;
    catalog_ops::update_config(txn, &config)
}

/// Set or clear the parent's init callback. The name must be registered.
pub fn set_init_callback(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    parent: RelationId,
    name: Option<&str>,
) -> Result<()> {
    if let Some(name) = name
        && !callbacks.contains(name)
    {
        return Err(StateError::CallbackNotRegistered(name.to_string()).into());
    }
    let mut config = catalog_ops::require_config(txn, parent)?;
    config.init_callback = name.map(str::to_string);
    config.version += 1;
    catalog_ops::update_config(txn, &config)
}

/// Auto-extension body: append (or prepend) interval-width partitions until
/// `key` is covered, then return the created children. Runs under the
/// caller's structural lock; the caller re-checks routing first so a racer
/// that lost the lock reuses the winner's partition instead of spawning a
/// duplicate.
pub fn spawn_partitions_for(
    txn: &mut Transaction,
    callbacks: &CallbackRegistry,
    parent: RelationId,
    key: &KeyValue,
) -> Result<Vec<RelationId>> {
    let mut created = Vec::new();
    loop {
        let Some(snapshot) = CacheSnapshot::build(txn, parent)? else {
            return Err(
                StateError::NotPartitioned(catalog_ops::relation_display(txn, parent)).into(),
            );
        };
        match routing::route(&snapshot, key)? {
            RouteResult::Partition(_) => return Ok(created),
            RouteResult::OutOfRange => {
                let Some((hull_min, hull_max)) = routing::coverage_hull(&snapshot) else {
                    return Err(StateError::NoPartitions(
                        catalog_ops::relation_display(txn, parent),
                    )
                    .into());
                };
                if key >= hull_min && key < hull_max {
                    // A deliberate gap; auto-extension only grows outward.
                    return Err(ValidationError::ValueOutOfCoverage {
                        parent: catalog_ops::relation_display(txn, parent),
                        value: key.to_string(),
                    }
                    .into());
                }
                if created.len() >= MAX_AUTO_SPAWN {
                    return Err(ValidationError::AutoSpawnLimit {
                        value: key.to_string(),
                        limit: MAX_AUTO_SPAWN,
                    }
                    .into());
                }
                let grow_up = key >= hull_max;
                let child = if grow_up {
                    append_range_partition(txn, callbacks, parent, None, None)?
                } else {
                    prepend_range_partition(txn, callbacks, parent, None, None)?
                };
                created.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use serde_json::json;

    /// Create a table and fill it with `rows` documents `{"id": i}`.
    fn seed(engine: &MemoryEngine, name: &str, rows: std::ops::Range<i64>) -> RelationId {
        engine
            .transact(|txn| {
                catalog_ops::bootstrap(txn)?;
                let rel = match txn.relation_by_name(name) {
                    Some(meta) => meta.id,
                    None => txn.create_relation(name, None, false)?,
                };
                for i in rows.clone() {
                    let row_id = txn.allocate_row_id();
                    txn.put_row(
                        rel,
                        encoding::encode_bare_row_key(row_id),
                        row_id,
                        json!({"id": i}),
                    )?;
                }
                Ok(rel)
            })
            .unwrap()
    }

    fn range_bounds(engine: &MemoryEngine, parent: RelationId) -> Vec<(i64, i64)> {
        let snap = engine.snapshot();
        catalog_ops::entries_for_parent(&snap, parent)
            .unwrap()
            .iter()
            .filter_map(|e| match &e.bounds {
                PartitionBounds::Range {
                    min: KeyValue::Int(a),
                    max: KeyValue::Int(b),
                } => Some((*a, *b)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_create_range_partitions_layout() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 0..0);
        let registry = CallbackRegistry::new();

        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(1),
                    10,
                    Some(5),
                    true,
                )
            })
            .unwrap();

        // Disjoint, sorted, and their union is exactly [1, 51).
        assert_eq!(
            range_bounds(&engine, parent),
            vec![(1, 11), (11, 21), (21, 31), (31, 41), (41, 51)]
        );
        let snap = engine.snapshot();
        assert!(snap.relation_by_name("abc_1").is_some());
        assert!(snap.relation_by_name("abc_5").is_some());
    }

    #[test]
    fn test_create_range_partitions_moves_data() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 1..31);
        let registry = CallbackRegistry::new();

        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(1),
                    10,
                    None,
                    true,
                )
            })
            .unwrap();

        let snap = engine.snapshot();
        assert_eq!(snap.row_count(parent).unwrap(), 0);
        let total: usize = catalog_ops::entries_for_parent(&snap, parent)
            .unwrap()
            .iter()
            .map(|e| snap.row_count(e.child).unwrap())
            .sum();
        assert_eq!(total, 30);
        // Derived count: values 1..=30 with width 10 from 1 need 3 partitions.
        assert_eq!(range_bounds(&engine, parent).len(), 3);
        let config = catalog_ops::get_config(&snap, parent).unwrap().unwrap();
        assert!(!config.enable_parent);
    }

    #[test]
    fn test_create_without_moving_keeps_parent_enabled() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 1..21);
        let registry = CallbackRegistry::new();

        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(1),
                    10,
                    None,
                    false,
                )
            })
            .unwrap();

        let snap = engine.snapshot();
        assert_eq!(snap.row_count(parent).unwrap(), 20);
        let config = catalog_ops::get_config(&snap, parent).unwrap().unwrap();
        assert!(config.enable_parent);
    }

    #[test]
    fn test_create_validations() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 0..10);
        let registry = CallbackRegistry::new();

        // Data below the initial bound.
        let result = engine.transact(|txn| {
            create_range_partitions(txn, &registry, parent, "id", KeyValue::Int(5), 10, None, true)
        });
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::DataBelowStart { .. }))
        ));

        // Too few partitions for the data.
        let result = engine.transact(|txn| {
            create_range_partitions(
                txn,
                &registry,
                parent,
                "id",
                KeyValue::Int(0),
                2,
                Some(1),
                true,
            )
        });
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::NotEnoughPartitions { .. }))
        ));

        // Empty table needs an explicit count.
        let empty = seed(&engine, "empty", 0..0);
        let result = engine.transact(|txn| {
            create_range_partitions(txn, &registry, empty, "id", KeyValue::Int(0), 10, None, true)
        });
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::PartitionCountRequired(_)))
        ));

        // Double partitioning.
        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    10,
                    None,
                    true,
                )
            })
            .unwrap();
        let result = engine.transact(|txn| {
            create_range_partitions(txn, &registry, parent, "id", KeyValue::Int(0), 10, None, true)
        });
        assert!(matches!(
            result,
            Err(Error::State(StateError::AlreadyPartitioned(_)))
        ));
    }

    #[test]
    fn test_create_hash_partitions_distributes_all_rows() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "items", 0..100);
        let registry = CallbackRegistry::new();

        let children = engine
            .transact(|txn| {
                create_hash_partitions(txn, &registry, parent, "id", KeyType::Int, 4, true)
            })
            .unwrap();
        assert_eq!(children.len(), 4);

        let snap = engine.snapshot();
        assert_eq!(snap.row_count(parent).unwrap(), 0);
        let counts: Vec<usize> = children
            .iter()
            .map(|&c| snap.row_count(c).unwrap())
            .collect();
        assert_eq!(counts.iter().sum::<usize>(), 100);
        assert!(
            counts.iter().all(|&c| c > 0),
            "hash should spread 100 rows over all 4 partitions, got {counts:?}"
        );
    }

    #[test]
    fn test_append_and_prepend_use_edge_width() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 0..0);
        let registry = CallbackRegistry::new();

        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    10,
                    Some(2),
                    true,
                )?;
                append_range_partition(txn, &registry, parent, None, None)?;
                prepend_range_partition(txn, &registry, parent, None, None)
            })
            .unwrap();

        assert_eq!(
            range_bounds(&engine, parent),
            vec![(-10, 0), (0, 10), (10, 20), (20, 30)]
        );
    }

    #[test]
    fn test_add_range_partition_gap_and_overlap() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 0..0);
        let registry = CallbackRegistry::new();

        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    10,
                    Some(1),
                    true,
                )?;
                // A gap is fine.
                add_range_partition(
                    txn,
                    &registry,
                    parent,
                    KeyValue::Int(500),
                    KeyValue::Int(550),
                    None,
                    None,
                )
            })
            .unwrap();

        let result = engine.transact(|txn| {
            add_range_partition(
                txn,
                &registry,
                parent,
                KeyValue::Int(5),
                KeyValue::Int(15),
                None,
                None,
            )
        });
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::RangeOverlap { .. }))
        ));
    }

    #[test]
    fn test_split_moves_upper_rows() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 0..20);
        let registry = CallbackRegistry::new();

        let (first, sibling) = engine
            .transact(|txn| {
                let children = create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    20,
                    Some(1),
                    true,
                )?;
                let sibling =
                    split_range_partition(txn, &registry, children[0], KeyValue::Int(10), None, None)?;
                Ok((children[0], sibling))
            })
            .unwrap();

        assert_eq!(range_bounds(&engine, parent), vec![(0, 10), (10, 20)]);
        let snap = engine.snapshot();
        assert_eq!(snap.row_count(first).unwrap(), 10);
        assert_eq!(snap.row_count(sibling).unwrap(), 10);

        // Split point must be strictly inside.
        let result = engine.transact(|txn| {
            split_range_partition(txn, &registry, first, KeyValue::Int(0), None, None)
        });
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::SplitPointOutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_merge_requires_adjacency() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 0..30);
        let registry = CallbackRegistry::new();

        let children = engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    10,
                    Some(3),
                    true,
                )
            })
            .unwrap();

        // Non-adjacent pair.
        let result =
            engine.transact(|txn| merge_range_partitions(txn, children[0], children[2]));
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::NotAdjacent { .. }))
        ));

        // Wrong order (right before left) is also not adjacent.
        let result =
            engine.transact(|txn| merge_range_partitions(txn, children[1], children[0]));
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::NotAdjacent { .. }))
        ));

        engine
            .transact(|txn| merge_range_partitions(txn, children[0], children[1]))
            .unwrap();

        assert_eq!(range_bounds(&engine, parent), vec![(0, 20), (20, 30)]);
        let snap = engine.snapshot();
        assert_eq!(snap.row_count(children[0]).unwrap(), 20);
        // The merged-away relation is gone.
        assert!(snap.relation(children[1]).is_err());
    }

    #[test]
    fn test_attach_validates_rows_and_rekeys() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 0..0);
        let registry = CallbackRegistry::new();
        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    10,
                    Some(1),
                    true,
                )
            })
            .unwrap();

        let outside = seed(&engine, "standalone", 10..30);
        let result = engine.transact(|txn| {
            attach_range_partition(
                txn,
                &registry,
                parent,
                outside,
                KeyValue::Int(10),
                KeyValue::Int(20),
            )
        });
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::RowOutOfBounds { .. }))
        ));

        let fits = seed(&engine, "fits", 10..20);
        engine
            .transact(|txn| {
                attach_range_partition(
                    txn,
                    &registry,
                    parent,
                    fits,
                    KeyValue::Int(10),
                    KeyValue::Int(20),
                )
            })
            .unwrap();
        assert_eq!(range_bounds(&engine, parent), vec![(0, 10), (10, 20)]);

        // Rows were re-keyed under their key value.
        let snap = engine.snapshot();
        let prefix = encoding::encode_key(&KeyValue::Int(15)).unwrap();
        assert_eq!(snap.scan_prefix(fits, &prefix).unwrap().len(), 1);

        // A relation without the key column is incompatible.
        let bad = engine
            .transact(|txn| {
                let rel = txn.create_relation("bad", None, false)?;
                let row_id = txn.allocate_row_id();
                txn.put_row(
                    rel,
                    encoding::encode_bare_row_key(row_id),
                    row_id,
                    json!({"other": 1}),
                )?;
                Ok(rel)
            })
            .unwrap();
        let result = engine.transact(|txn| {
            attach_range_partition(
                txn,
                &registry,
                parent,
                bad,
                KeyValue::Int(20),
                KeyValue::Int(30),
            )
        });
        assert!(matches!(
            result,
            Err(Error::State(StateError::IncompatibleSchema { .. }))
        ));
    }

    #[test]
    fn test_detach_leaves_standalone_relation() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "abc", 0..10);
        let registry = CallbackRegistry::new();

        let children = engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    10,
                    Some(1),
                    true,
                )
            })
            .unwrap();

        engine
            .transact(|txn| detach_range_partition(txn, children[0]))
            .unwrap();

        let snap = engine.snapshot();
        assert!(catalog_ops::get_entry(&snap, children[0]).unwrap().is_none());
        assert_eq!(snap.row_count(children[0]).unwrap(), 10);
    }

    #[test]
    fn test_replace_hash_partition_swaps_one_index() {
        let engine = MemoryEngine::new();
        let parent = seed(&engine, "items", 0..0);
        let registry = CallbackRegistry::new();

        let children = engine
            .transact(|txn| {
                create_hash_partitions(txn, &registry, parent, "id", KeyType::Int, 2, true)
            })
            .unwrap();

        let replacement = seed(&engine, "replacement", 0..0);
        engine
            .transact(|txn| replace_hash_partition(txn, children[0], replacement))
            .unwrap();

        let snap = engine.snapshot();
        let entries = catalog_ops::entries_for_parent(&snap, parent).unwrap();
        assert_eq!(entries.len(), 2);
        let slot0 = entries.iter().find(|e| e.hash_index() == Some(0)).unwrap();
        assert_eq!(slot0.child, replacement);
        // The old relation survives, detached.
        assert!(snap.relation(children[0]).is_ok());
        assert!(catalog_ops::get_entry(&snap, children[0]).unwrap().is_none());
    }

    #[test]
    fn test_drop_partitions_cascade_and_keep() {
        let engine = MemoryEngine::new();
        let registry = CallbackRegistry::new();

        let parent = seed(&engine, "abc", 0..10);
        let children = engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    5,
                    None,
                    true,
                )
            })
            .unwrap();

        let dropped = engine
            .transact(|txn| drop_partitions(txn, parent, false))
            .unwrap();
        assert_eq!(dropped, 2);
        let snap = engine.snapshot();
        assert!(catalog_ops::get_config(&snap, parent).unwrap().is_none());
        // Children survive standalone with their rows.
        assert_eq!(snap.row_count(children[0]).unwrap(), 5);

        // Cascade drops the relations too.
        let parent2 = seed(&engine, "xyz", 0..10);
        let children2 = engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent2,
                    "id",
                    KeyValue::Int(0),
                    5,
                    None,
                    true,
                )
            })
            .unwrap();
        engine
            .transact(|txn| drop_partitions(txn, parent2, true))
            .unwrap();
        let snap = engine.snapshot();
        assert!(snap.relation(children2[0]).is_err());
    }

    #[test]
    fn test_init_callback_runs_inside_transaction() {
        let engine = MemoryEngine::new();
        let registry = CallbackRegistry::new();
        registry.register("reject_all", |_| {
            Err(StateError::CallbackNotRegistered("boom".to_string()).into())
        });
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        registry.register("record", move |arg| {
            seen2.lock().push(arg.clone());
            Ok(())
        });

        let parent = seed(&engine, "abc", 0..0);
        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    10,
                    Some(1),
                    true,
                )?;
                set_init_callback(txn, &registry, parent, Some("record"))
            })
            .unwrap();

        engine
            .transact(|txn| {
                append_range_partition(txn, &registry, parent, None, None)?;
                Ok(())
            })
            .unwrap();
        {
            let calls = seen.lock();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0]["parttype"], "range");
            assert_eq!(calls[0]["range_min"], 10);
            assert_eq!(calls[0]["range_max"], 20);
        }

        // A failing callback aborts the whole creation.
        engine
            .transact(|txn| set_init_callback(txn, &registry, parent, Some("reject_all")))
            .unwrap();
        let before = range_bounds(&engine, parent);
        let result = engine.transact(|txn| {
            append_range_partition(txn, &registry, parent, None, None)?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(range_bounds(&engine, parent), before);

        // Setting an unregistered callback is rejected up front.
        let result =
            engine.transact(|txn| set_init_callback(txn, &registry, parent, Some("missing")));
        assert!(matches!(
            result,
            Err(Error::State(StateError::CallbackNotRegistered(_)))
        ));
    }

    #[test]
    fn test_spawn_partitions_grows_to_cover_value() {
        let engine = MemoryEngine::new();
        let registry = CallbackRegistry::new();
        let parent = seed(&engine, "abc", 0..0);
        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(1),
                    10,
                    Some(5),
                    true,
                )
            })
            .unwrap();

        // Value just past the hull: one new partition.
        let created = engine
            .transact(|txn| spawn_partitions_for(txn, &registry, parent, &KeyValue::Int(55)))
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(
            range_bounds(&engine, parent).last().copied(),
            Some((51, 61))
        );

        // Far below the hull: several prepends.
        let created = engine
            .transact(|txn| spawn_partitions_for(txn, &registry, parent, &KeyValue::Int(-25)))
            .unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(
            range_bounds(&engine, parent).first().copied(),
            Some((-29, -19))
        );

        // Already covered: nothing spawns.
        let created = engine
            .transact(|txn| spawn_partitions_for(txn, &registry, parent, &KeyValue::Int(5)))
            .unwrap();
        assert!(created.is_empty());
    }

    #[test]
    fn test_spawn_partitions_refuses_gaps() {
        let engine = MemoryEngine::new();
        let registry = CallbackRegistry::new();
        let parent = seed(&engine, "abc", 0..0);
        engine
            .transact(|txn| {
                create_range_partitions(
                    txn,
                    &registry,
                    parent,
                    "id",
                    KeyValue::Int(0),
                    10,
                    Some(1),
                    true,
                )?;
                add_range_partition(
                    txn,
                    &registry,
                    parent,
                    KeyValue::Int(100),
                    KeyValue::Int(110),
                    None,
                    None,
                )
            })
            .unwrap();

        let result = engine
            .transact(|txn| spawn_partitions_for(txn, &registry, parent, &KeyValue::Int(50)));
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::ValueOutOfCoverage { .. }))
        ));
    }
}
