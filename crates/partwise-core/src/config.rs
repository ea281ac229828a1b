//! Manager-level options.

use std::time::Duration;

use crate::types::{DEFAULT_MIGRATION_BATCH_SIZE, DEFAULT_MIGRATION_MAX_RETRIES};

/// Tunables of one [`PartitionManager`](crate::api::PartitionManager).
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// How long a structural-lock request waits behind earlier requests
    /// before the caller's operation aborts with a timeout.
    pub lock_timeout: Duration,
    /// Whether an insert whose key falls outside all partitions may create
    /// the missing range partitions itself.
    pub auto_extend: bool,
    /// Rows per migration batch transaction.
    pub migration_batch_size: usize,
    /// Pause between migration batches.
    pub migration_sleep: Duration,
    /// Conflicting-batch retries before a migration task halts with an
    /// error.
    pub migration_max_retries: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
            auto_extend: true,
            migration_batch_size: DEFAULT_MIGRATION_BATCH_SIZE,
            migration_sleep: Duration::from_secs(1),
            migration_max_retries: DEFAULT_MIGRATION_MAX_RETRIES,
        }
    }
}
