//! Core types: relation identifiers, partition-key values, strategies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ValidationError};

/// Transaction identifier (monotonically increasing).
pub type TxnId = u64;

/// Row identifier, unique across all relations of one engine.
pub type RowId = u64;

/// Identifier of a relation (a parent table or one of its partitions).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RelationId(pub u64);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum number of partitions a single insert may spawn through
/// auto-extension before the insert is rejected.
pub const MAX_AUTO_SPAWN: usize = 1000;

/// Default number of rows a migration batch moves in one transaction.
pub const DEFAULT_MIGRATION_BATCH_SIZE: usize = 1000;

/// Default number of times a conflicting migration batch is retried
/// before the task halts with an error.
pub const DEFAULT_MIGRATION_MAX_RETRIES: usize = 10;

/// The partitioning strategy of a parent table. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionStrategy {
    Range,
    Hash,
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionStrategy::Range => write!(f, "range"),
            PartitionStrategy::Hash => write!(f, "hash"),
        }
    }
}

/// The type of a partition-key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    Int,
    Str,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Int => write!(f, "int"),
            KeyType::Str => write!(f, "str"),
        }
    }
}

/// A partition-key value.
///
/// Values of different types never compare against each other in practice:
/// a parent's key type is fixed in its configuration and every routed value
/// is checked against it first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyValue {
    Int(i64),
    Str(String),
}

impl KeyValue {
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyValue::Int(_) => KeyType::Int,
            KeyValue::Str(_) => KeyType::Str,
        }
    }

    /// Extract a key value of the expected type from a JSON document field.
    pub fn from_json(value: &serde_json::Value, expected: KeyType) -> Option<KeyValue> {
        match expected {
            KeyType::Int => value.as_i64().map(KeyValue::Int),
            KeyType::Str => value.as_str().map(|s| KeyValue::Str(s.to_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            KeyValue::Int(v) => serde_json::Value::from(*v),
            KeyValue::Str(s) => serde_json::Value::from(s.as_str()),
        }
    }

    /// Shift an integer key by `delta`. Bound arithmetic is only defined for
    /// integer keys; string bounds can only be given explicitly.
    pub fn offset_by(&self, delta: i64) -> Result<KeyValue, Error> {
        match self {
            KeyValue::Int(v) => v
                .checked_add(delta)
                .map(KeyValue::Int)
                .ok_or_else(|| ValidationError::BoundOverflow.into()),
            KeyValue::Str(_) => Err(ValidationError::ComputedBoundsRequireIntKey.into()),
        }
    }

    /// Width of the interval `[self, other)` for integer keys.
    pub fn distance_to(&self, other: &KeyValue) -> Result<i64, Error> {
        match (self, other) {
            (KeyValue::Int(a), KeyValue::Int(b)) => b
                .checked_sub(*a)
                .ok_or_else(|| ValidationError::BoundOverflow.into()),
            _ => Err(ValidationError::ComputedBoundsRequireIntKey.into()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{v}"),
            KeyValue::Str(s) => write!(f, "'{s}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let doc = serde_json::json!({"id": 42, "name": "abc"});
        assert_eq!(
            KeyValue::from_json(&doc["id"], KeyType::Int),
            Some(KeyValue::Int(42))
        );
        assert_eq!(
            KeyValue::from_json(&doc["name"], KeyType::Str),
            Some(KeyValue::Str("abc".to_string()))
        );
        // Type mismatch yields None.
        assert_eq!(KeyValue::from_json(&doc["name"], KeyType::Int), None);
        assert_eq!(KeyValue::from_json(&doc["missing"], KeyType::Int), None);
    }

    #[test]
    fn test_offset_and_distance() {
        let k = KeyValue::Int(10);
        assert_eq!(k.offset_by(5).unwrap(), KeyValue::Int(15));
        assert_eq!(k.distance_to(&KeyValue::Int(25)).unwrap(), 15);
        assert!(KeyValue::Int(i64::MAX).offset_by(1).is_err());
        assert!(KeyValue::Str("a".into()).offset_by(1).is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(KeyValue::Int(1) < KeyValue::Int(2));
        assert!(KeyValue::Str("a".into()) < KeyValue::Str("b".into()));
    }
}
