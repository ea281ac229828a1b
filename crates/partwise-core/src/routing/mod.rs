//! Routing engine: maps partition-key values to partitions over a cached
//! catalog snapshot, and computes pruning sets for predicate ranges.

use xxhash_rust::xxh64::xxh64;

use crate::cache::CacheSnapshot;
use crate::catalog::PartitionEntry;
use crate::encoding;
use crate::error::{Error, Result, ValidationError};
use crate::types::{KeyValue, PartitionStrategy, RelationId};

/// Outcome of routing one key value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteResult {
    /// The value belongs to this partition.
    Partition(RelationId),
    /// No partition covers the value.
    OutOfRange,
}

/// Extract the partition-key value from a document.
pub fn key_from_doc(
    doc: &serde_json::Value,
    column: &str,
    expected: crate::types::KeyType,
) -> Result<KeyValue> {
    let field = doc
        .get(column)
        .ok_or_else(|| Error::from(ValidationError::MissingKeyColumn(column.to_string())))?;
    KeyValue::from_json(field, expected).ok_or_else(|| {
        ValidationError::KeyTypeMismatch {
            column: column.to_string(),
            expected: expected.to_string(),
            actual: field.to_string(),
        }
        .into()
    })
}

/// The hash slot of a key value for the given modulus. Total and stable:
/// the same `(value, modulus)` pair always yields the same slot.
pub fn hash_slot(key: &KeyValue, modulus: u32) -> Result<u32> {
    let bytes = encoding::encode_key(key)?;
    Ok((xxh64(&bytes, 0) % u64::from(modulus)) as u32)
}

/// Route a key value through a catalog snapshot.
pub fn route(snapshot: &CacheSnapshot, key: &KeyValue) -> Result<RouteResult> {
    if key.key_type() != snapshot.config.key_type {
        return Err(ValidationError::KeyTypeMismatch {
            column: snapshot.config.key_column.clone(),
            expected: snapshot.config.key_type.to_string(),
            actual: key.key_type().to_string(),
        }
        .into());
    }
    match snapshot.config.strategy {
        PartitionStrategy::Hash => {
            let slot = hash_slot(key, snapshot.config.partition_count)?;
            Ok(snapshot
                .by_index
                .get(slot as usize)
                .copied()
                .flatten()
                .map_or(RouteResult::OutOfRange, RouteResult::Partition))
        }
        PartitionStrategy::Range => {
            // Entries are sorted by min; find the first whose max exceeds
            // the key, then check its min.
            let idx = snapshot
                .entries
                .partition_point(|e| e.range().is_some_and(|(_, max)| max <= key));
            match snapshot.entries.get(idx) {
                Some(entry)
                    if entry.range().is_some_and(|(min, _)| min <= key) =>
                {
                    Ok(RouteResult::Partition(entry.child))
                }
                _ => Ok(RouteResult::OutOfRange),
            }
        }
    }
}

/// The ordered subset of partitions whose key coverage intersects the
/// closed predicate interval `[lower, upper]` (`None` bounds are
/// unbounded). For hash strategy the full entry set is returned: residues
/// carry no order, so an interval predicate cannot exclude any of them.
pub fn prune<'a>(
    snapshot: &'a CacheSnapshot,
    lower: Option<&KeyValue>,
    upper: Option<&KeyValue>,
) -> Vec<&'a PartitionEntry> {
    match snapshot.config.strategy {
        PartitionStrategy::Hash => snapshot.entries.iter().collect(),
        PartitionStrategy::Range => snapshot
            .entries
            .iter()
            .filter(|e| {
                e.range().is_some_and(|(min, max)| {
                    upper.is_none_or(|u| min <= u) && lower.is_none_or(|l| l < max)
                })
            })
            .collect(),
    }
}

/// Partitions that can hold rows with `key` exactly: the single routed
/// partition, or none when the value is uncovered. This is what an equality
/// predicate pins; for hash strategy it prunes down to one slot.
pub fn prune_eq<'a>(
    snapshot: &'a CacheSnapshot,
    key: &KeyValue,
) -> Result<Vec<&'a PartitionEntry>> {
    match route(snapshot, key)? {
        RouteResult::Partition(child) => Ok(snapshot
            .entries
            .iter()
            .filter(|e| e.child == child)
            .collect()),
        RouteResult::OutOfRange => Ok(Vec::new()),
    }
}

/// The overall `[min, max)` hull of a range-partitioned parent's coverage,
/// `None` when it has no partitions (or is hash-partitioned).
pub fn coverage_hull(snapshot: &CacheSnapshot) -> Option<(&KeyValue, &KeyValue)> {
    let first = snapshot.entries.first()?.range()?;
    let last = snapshot.entries.last()?.range()?;
    Some((first.0, last.1))
}
