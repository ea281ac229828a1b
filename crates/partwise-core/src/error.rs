//! Error types for all partition-manager operations.
//!
//! Every failure family gets its own enum; all of them are rejected before
//! any catalog mutation is staged, so a caller that sees one of these errors
//! can rely on the catalog being untouched (migration conflicts excepted,
//! which are retried internally).

use thiserror::Error;

use crate::types::{RelationId, RowId};

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Malformed input rejected before any mutation. Recoverable by the caller
/// retrying with corrected arguments.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("range [{min}, {max}) overlaps existing partition '{existing}'")]
    RangeOverlap {
        min: String,
        max: String,
        existing: String,
    },

    #[error("range lower bound {min} must be below upper bound {max}")]
    InvalidBounds { min: String, max: String },

    #[error("hash index {index} is already owned by partition '{existing}'")]
    DuplicateHashIndex { index: u32, existing: String },

    #[error("hash index {index} is out of range [0, {modulus})")]
    HashIndexOutOfRange { index: u32, modulus: u32 },

    #[error("partitions '{left}' and '{right}' are not adjacent")]
    NotAdjacent { left: String, right: String },

    #[error("split point {at} is not strictly inside [{min}, {max})")]
    SplitPointOutOfBounds {
        at: String,
        min: String,
        max: String,
    },

    #[error("partition bounds can only be computed for integer keys")]
    ComputedBoundsRequireIntKey,

    #[error("partition interval must be positive (got {0})")]
    NonPositiveInterval(i64),

    #[error("partition bound arithmetic overflowed")]
    BoundOverflow,

    #[error("partition count is required: table '{0}' is empty")]
    PartitionCountRequired(String),

    #[error("not enough partitions to fit all values: need at least {needed}")]
    NotEnoughPartitions { needed: usize },

    #[error("value {value} is below the initial bound {start}")]
    DataBelowStart { value: String, start: String },

    #[error("row with value {value} falls outside [{min}, {max})")]
    RowOutOfBounds {
        value: String,
        min: String,
        max: String,
    },

    #[error("value {value} would require more than {limit} new partitions")]
    AutoSpawnLimit { value: String, limit: usize },

    #[error("no partition of '{parent}' holds value {value}")]
    ValueOutOfCoverage { parent: String, value: String },

    #[error("document is missing partition key column '{0}'")]
    MissingKeyColumn(String),

    #[error("partition key '{column}' expected a {expected} value, got {actual}")]
    KeyTypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("null byte (0x00) is not allowed in string keys")]
    NulByteInKey,
}

/// The catalog is not in a state that permits the requested operation.
/// Rejected before any mutation.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("table '{0}' is already partitioned")]
    AlreadyPartitioned(String),

    #[error("table '{0}' is not partitioned")]
    NotPartitioned(String),

    #[error("relation '{0}' is not a partition")]
    PartitionNotFound(String),

    #[error("relation '{0}' is already a partition")]
    AlreadyAPartition(String),

    #[error("table '{relation}' is partitioned by {actual}, expected {expected}")]
    StrategyMismatch {
        relation: String,
        expected: String,
        actual: String,
    },

    #[error("partitions '{left}' and '{right}' belong to different parents")]
    ParentMismatch { left: String, right: String },

    #[error("relation '{relation}' has rows without partition key column '{column}'")]
    IncompatibleSchema { relation: String, column: String },

    #[error("table '{0}' has no partitions")]
    NoPartitions(String),

    #[error("a migration task for '{0}' is already active")]
    MigrationAlreadyRunning(String),

    #[error("init callback '{0}' is not registered")]
    CallbackNotRegistered(String),
}

/// Lock acquisition failures. The caller's transaction aborts with the
/// catalog untouched; retrying is always safe.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out waiting for structural lock on '{parent}' after {waited_ms} ms")]
    Timeout { parent: String, waited_ms: u64 },
}

/// Migration worker failures.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration batch conflict on '{parent}': row {row_id} changed concurrently")]
    BatchConflict { parent: String, row_id: RowId },

    #[error("migration for '{parent}' gave up after {attempts} conflicting batch attempts")]
    RetriesExhausted { parent: String, attempts: usize },

    #[error("failed to spawn migration worker: {0}")]
    WorkerSpawn(String),
}

/// Host-engine failures surfaced through the manager.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("relation not found: {0}")]
    RelationNotFound(String),

    #[error("unknown relation id: {0}")]
    UnknownRelation(RelationId),

    #[error("relation already exists: {0}")]
    RelationExists(String),

    #[error("row not found in relation '{0}'")]
    RowNotFound(String),

    #[error("row version mismatch: expected {expected}, actual {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("corrupted catalog row: {0}")]
    CorruptedCatalogRow(String),
}

pub type Result<T> = std::result::Result<T, Error>;
