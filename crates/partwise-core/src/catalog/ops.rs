//! Catalog operations: validated reads and mutations of configuration and
//! entry rows.
//!
//! Mutations never upsert blindly: every write path validates the resulting
//! catalog state (non-overlapping ranges, 1:1 hash index ownership, child
//! uniqueness) before staging anything, so a failed call aborts its
//! transaction with the catalog untouched.

use crate::engine::{RelationReader, Transaction};
use crate::error::{EngineError, Error, Result, StateError, ValidationError};
use crate::types::RelationId;

use super::{PartitionBounds, PartitionEntry, PartitionedTableConfig};

/// System relation holding one configuration row per partitioned parent.
pub const CONFIG_RELATION: &str = "__partwise_config";

/// System relation holding one row per partition, keyed by child id.
pub const ENTRY_RELATION: &str = "__partwise_entry";

/// Create the catalog's system relations if they do not exist yet.
pub fn bootstrap(txn: &mut Transaction) -> Result<()> {
    for name in [CONFIG_RELATION, ENTRY_RELATION] {
        if txn.relation_by_name(name).is_none() {
            txn.create_relation(name, None, false)?;
        }
    }
    Ok(())
}

fn system_relation(r: &impl RelationReader, name: &str) -> Result<RelationId> {
    r.relation_by_name(name)
        .map(|m| m.id)
        .ok_or_else(|| EngineError::RelationNotFound(name.to_string()).into())
}

fn id_key(id: RelationId) -> Vec<u8> {
    id.0.to_be_bytes().to_vec()
}

/// Best-effort display name for error messages; falls back to the raw id
/// when the relation itself is gone.
pub fn relation_display(r: &impl RelationReader, id: RelationId) -> String {
    r.relation(id).map(|m| m.name).unwrap_or_else(|_| id.to_string())
}

fn decode<T: serde::de::DeserializeOwned>(doc: serde_json::Value) -> Result<T> {
    serde_json::from_value(doc)
        .map_err(|e| EngineError::CorruptedCatalogRow(e.to_string()).into())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| EngineError::CorruptedCatalogRow(e.to_string()).into())
}

/// Read a parent's configuration row, `None` if the parent is not
/// partitioned.
pub fn get_config(
    r: &impl RelationReader,
    parent: RelationId,
) -> Result<Option<PartitionedTableConfig>> {
    let sys = system_relation(r, CONFIG_RELATION)?;
    match r.get_row(sys, &id_key(parent))? {
        Some(row) => Ok(Some(decode(row.doc)?)),
        None => Ok(None),
    }
}

/// Read a parent's configuration row, failing if the parent is not
/// partitioned.
pub fn require_config(
    r: &impl RelationReader,
    parent: RelationId,
) -> Result<PartitionedTableConfig> {
    get_config(r, parent)?
        .ok_or_else(|| StateError::NotPartitioned(relation_display(r, parent)).into())
}

/// Insert the configuration row for a newly partitioned parent.
pub fn insert_config(txn: &mut Transaction, config: &PartitionedTableConfig) -> Result<()> {
    if get_config(txn, config.parent)?.is_some() {
        return Err(StateError::AlreadyPartitioned(relation_display(txn, config.parent)).into());
    }
    write_config(txn, config)
}

/// Overwrite an existing configuration row.
pub fn update_config(txn: &mut Transaction, config: &PartitionedTableConfig) -> Result<()> {
    require_config(txn, config.parent)?;
    write_config(txn, config)
}

fn write_config(txn: &mut Transaction, config: &PartitionedTableConfig) -> Result<()> {
    let sys = system_relation(txn, CONFIG_RELATION)?;
    txn.put_row(sys, id_key(config.parent), config.parent.0, encode(config)?)
}

/// Bump a parent's cache-invalidation token. Called once by every
/// structural mutation; configuration updates bump the token themselves by
/// rewriting the row through [`update_config`] with `version + 1`.
pub fn touch_config(txn: &mut Transaction, parent: RelationId) -> Result<u64> {
    let mut config = require_config(txn, parent)?;
    config.version += 1;
    write_config(txn, &config)?;
    Ok(config.version)
}

/// Remove a parent's configuration row.
pub fn delete_config(txn: &mut Transaction, parent: RelationId) -> Result<()> {
    require_config(txn, parent)?;
    let sys = system_relation(txn, CONFIG_RELATION)?;
    txn.delete_row(sys, &id_key(parent))
}

/// Read the entry binding `child` to its parent, `None` if `child` is not
/// a partition.
pub fn get_entry(r: &impl RelationReader, child: RelationId) -> Result<Option<PartitionEntry>> {
    let sys = system_relation(r, ENTRY_RELATION)?;
    match r.get_row(sys, &id_key(child))? {
        Some(row) => Ok(Some(decode(row.doc)?)),
        None => Ok(None),
    }
}

/// Every partition entry in the catalog, sorted by parent then child id.
pub fn all_entries(r: &impl RelationReader) -> Result<Vec<PartitionEntry>> {
    let sys = system_relation(r, ENTRY_RELATION)?;
    let mut entries = Vec::new();
    for (_key, row) in r.scan(sys, None)? {
        entries.push(decode::<PartitionEntry>(row.doc)?);
    }
    entries.sort_by_key(|e| (e.parent, e.child));
    Ok(entries)
}

/// All entries of one parent, sorted by range minimum (range strategy) or
/// hash index (hash strategy).
pub fn entries_for_parent(
    r: &impl RelationReader,
    parent: RelationId,
) -> Result<Vec<PartitionEntry>> {
    let sys = system_relation(r, ENTRY_RELATION)?;
    let mut entries = Vec::new();
    for (_key, row) in r.scan(sys, None)? {
        let entry: PartitionEntry = decode(row.doc)?;
        if entry.parent == parent {
            entries.push(entry);
        }
    }
    entries.sort_by(|a, b| match (&a.bounds, &b.bounds) {
        (PartitionBounds::Range { min: a, .. }, PartitionBounds::Range { min: b, .. }) => a.cmp(b),
        (PartitionBounds::Hash { index: a }, PartitionBounds::Hash { index: b }) => a.cmp(b),
        // Mixed bounds never occur for one parent; keep a stable order anyway.
        (PartitionBounds::Range { .. }, PartitionBounds::Hash { .. }) => std::cmp::Ordering::Less,
        (PartitionBounds::Hash { .. }, PartitionBounds::Range { .. }) => {
            std::cmp::Ordering::Greater
        }
    });
    Ok(entries)
}

/// Insert a new partition entry after validating it against the parent's
/// configuration and existing entries.
pub fn insert_entry(txn: &mut Transaction, entry: &PartitionEntry) -> Result<()> {
    if get_entry(txn, entry.child)?.is_some() {
        return Err(StateError::AlreadyAPartition(relation_display(txn, entry.child)).into());
    }
    validate_entry(txn, entry, None)?;
    write_entry(txn, entry)
}

/// Overwrite an existing partition entry (split/merge bound changes),
/// re-validating against all sibling entries.
pub fn update_entry(txn: &mut Transaction, entry: &PartitionEntry) -> Result<()> {
    if get_entry(txn, entry.child)?.is_none() {
        return Err(StateError::PartitionNotFound(relation_display(txn, entry.child)).into());
    }
    validate_entry(txn, entry, Some(entry.child))?;
    write_entry(txn, entry)
}

/// Remove and return the entry binding `child`.
pub fn remove_entry(txn: &mut Transaction, child: RelationId) -> Result<PartitionEntry> {
    let entry = get_entry(txn, child)?
        .ok_or_else(|| Error::from(StateError::PartitionNotFound(relation_display(txn, child))))?;
    let sys = system_relation(txn, ENTRY_RELATION)?;
    txn.delete_row(sys, &id_key(child))?;
    Ok(entry)
}

fn write_entry(txn: &mut Transaction, entry: &PartitionEntry) -> Result<()> {
    let sys = system_relation(txn, ENTRY_RELATION)?;
    txn.put_row(sys, id_key(entry.child), entry.child.0, encode(entry)?)
}

/// Validate an entry's bounds against the parent configuration and the
/// parent's other entries. `ignore` skips one child (the entry being
/// updated in place).
fn validate_entry(
    txn: &Transaction,
    entry: &PartitionEntry,
    ignore: Option<RelationId>,
) -> Result<()> {
    let config = require_config(txn, entry.parent)?;
    match &entry.bounds {
        PartitionBounds::Range { min, max } => {
            if config.strategy != crate::types::PartitionStrategy::Range {
                return Err(StateError::StrategyMismatch {
                    relation: relation_display(txn, entry.parent),
                    expected: crate::types::PartitionStrategy::Range.to_string(),
                    actual: config.strategy.to_string(),
                }
                .into());
            }
            if min.key_type() != config.key_type || max.key_type() != config.key_type {
                return Err(ValidationError::KeyTypeMismatch {
                    column: config.key_column.clone(),
                    expected: config.key_type.to_string(),
                    actual: min.key_type().to_string(),
                }
                .into());
            }
            if min >= max {
                return Err(ValidationError::InvalidBounds {
                    min: min.to_string(),
                    max: max.to_string(),
                }
                .into());
            }
            for other in entries_for_parent(txn, entry.parent)? {
                if Some(other.child) == ignore {
                    continue;
                }
                if let Some((omin, omax)) = other.range()
                    && min < omax
                    && omin < max
                {
                    return Err(ValidationError::RangeOverlap {
                        min: min.to_string(),
                        max: max.to_string(),
                        existing: relation_display(txn, other.child),
                    }
                    .into());
                }
            }
        }
        PartitionBounds::Hash { index } => {
            if config.strategy != crate::types::PartitionStrategy::Hash {
                return Err(StateError::StrategyMismatch {
                    relation: relation_display(txn, entry.parent),
                    expected: crate::types::PartitionStrategy::Hash.to_string(),
                    actual: config.strategy.to_string(),
                }
                .into());
            }
            if *index >= config.partition_count {
                return Err(ValidationError::HashIndexOutOfRange {
                    index: *index,
                    modulus: config.partition_count,
                }
                .into());
            }
            for other in entries_for_parent(txn, entry.parent)? {
                if Some(other.child) == ignore {
                    continue;
                }
                if other.hash_index() == Some(*index) {
                    return Err(ValidationError::DuplicateHashIndex {
                        index: *index,
                        existing: relation_display(txn, other.child),
                    }
                    .into());
                }
            }
        }
    }
    Ok(())
}
