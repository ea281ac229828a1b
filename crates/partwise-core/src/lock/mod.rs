//! Lock coordinator: serializes structural (catalog-mutating) work per
//! parent table.
//!
//! Two lock classes per parent:
//!
//! - **Structural**: at most one holder; waiters are served strictly in
//!   arrival order (ticket queue); released when the holder's guard drops,
//!   recording whether the protected transaction committed or rolled back.
//! - **Read**: any number of concurrent holders; blocked only while a
//!   structural holder is inside its publish window (the structural
//!   transaction itself), never for the rest of the structural hold.
//!
//! Locks are always taken parent-first in a single pass; no caller holds a
//! partial lock set while waiting for another lock, which is what rules out
//! deadlock between DDL, auto-extension, and migration batches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::LockError;
use crate::types::RelationId;

/// How the transaction protected by a structural lock ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOutcome {
    Committed,
    RolledBack,
}

#[derive(Default)]
struct LockState {
    /// Next ticket to hand out.
    next_ticket: u64,
    /// Ticket currently holding the structural lock; the lock is free when
    /// `now_serving == next_ticket`.
    now_serving: u64,
    /// Tickets whose waiters timed out; skipped when the queue advances.
    abandoned: HashSet<u64>,
    /// A structural holder is publishing its change; new readers wait.
    publishing: bool,
    /// Number of active read-lock holders.
    readers: usize,
    /// Outcome of the most recent structural hold.
    last_outcome: Option<TxnOutcome>,
}

struct ParentLock {
    state: Mutex<LockState>,
    cond: Condvar,
}

/// RAII holder of a structural lock on one parent.
///
/// Dropping the guard releases the lock and wakes the next queued waiter.
/// Unless [`commit`](Self::commit) was called first, the release is
/// recorded as a rollback.
pub struct StructuralGuard {
    lock: Arc<ParentLock>,
    ticket: u64,
    committed: bool,
}

impl StructuralGuard {
    /// Run `f` as this lock's publish window: new readers of the parent
    /// block until `f` returns. Used to wrap the structural transaction so
    /// that row access never interleaves with a half-applied change.
    pub fn publish<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        {
            // Gate new readers first, then drain the active ones, so a
            // steady stream of short reads cannot starve the publisher.
            let mut state = self.lock.state.lock();
            state.publishing = true;
            while state.readers > 0 {
                self.lock.cond.wait(&mut state);
            }
        }
        let result = f();
        {
            let mut state = self.lock.state.lock();
            state.publishing = false;
        }
        self.lock.cond.notify_all();
        result
    }

    /// Record that the protected transaction committed. Consumes the guard;
    /// the release itself happens on drop.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for StructuralGuard {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock();
        debug_assert_eq!(state.now_serving, self.ticket);
        state.last_outcome = Some(if self.committed {
            TxnOutcome::Committed
        } else {
            TxnOutcome::RolledBack
        });
        state.now_serving += 1;
        while {
            let next = state.now_serving;
            state.abandoned.remove(&next)
        } {
            state.now_serving += 1;
        }
        drop(state);
        self.lock.cond.notify_all();
    }
}

/// RAII holder of a read lock on one parent.
pub struct ReadGuard {
    lock: Arc<ParentLock>,
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock();
        state.readers -= 1;
        drop(state);
        self.lock.cond.notify_all();
    }
}

/// Per-parent lock table. One coordinator is shared by every session of a
/// manager; unrelated parents never contend.
#[derive(Default)]
pub struct LockCoordinator {
    parents: Mutex<HashMap<RelationId, Arc<ParentLock>>>,
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn parent_lock(&self, parent: RelationId) -> Arc<ParentLock> {
        self.parents
            .lock()
            .entry(parent)
            .or_insert_with(|| {
                Arc::new(ParentLock {
                    state: Mutex::new(LockState::default()),
                    cond: Condvar::new(),
                })
            })
            .clone()
    }

    /// Acquire the structural lock on `parent`, waiting at most `timeout`
    /// behind earlier requests. `parent_name` is only used in the timeout
    /// error.
    pub fn acquire_structural(
        &self,
        parent: RelationId,
        parent_name: &str,
        timeout: Duration,
    ) -> Result<StructuralGuard, LockError> {
        let lock = self.parent_lock(parent);
        let started = Instant::now();
        let deadline = started + timeout;

        let mut state = lock.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        while state.now_serving != ticket {
            if lock.cond.wait_until(&mut state, deadline).timed_out() {
                if state.now_serving == ticket {
                    // Granted right at the wire.
                    break;
                }
                state.abandoned.insert(ticket);
                return Err(LockError::Timeout {
                    parent: parent_name.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
        drop(state);

        Ok(StructuralGuard {
            lock,
            ticket,
            committed: false,
        })
    }

    /// Acquire a read lock on `parent`. Never blocked by other readers;
    /// waits only while a structural holder is publishing.
    pub fn read(&self, parent: RelationId) -> ReadGuard {
        let lock = self.parent_lock(parent);
        let mut state = lock.state.lock();
        while state.publishing {
            lock.cond.wait(&mut state);
        }
        state.readers += 1;
        drop(state);
        ReadGuard { lock }
    }

    /// Number of structural requests currently granted or queued for
    /// `parent` (holder included).
    pub fn pending_structural(&self, parent: RelationId) -> u64 {
        let lock = self.parent_lock(parent);
        let state = lock.state.lock();
        state.next_ticket - state.now_serving
    }

    /// Outcome of the most recently released structural hold on `parent`.
    pub fn last_outcome(&self, parent: RelationId) -> Option<TxnOutcome> {
        let lock = self.parent_lock(parent);
        let outcome = lock.state.lock().last_outcome;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    const PARENT: RelationId = RelationId(7);

    #[test]
    fn test_uncontended_acquire() {
        let locks = LockCoordinator::new();
        let guard = locks
            .acquire_structural(PARENT, "t", Duration::from_secs(1))
            .unwrap();
        assert_eq!(locks.pending_structural(PARENT), 1);
        guard.commit();
        assert_eq!(locks.pending_structural(PARENT), 0);
        assert_eq!(locks.last_outcome(PARENT), Some(TxnOutcome::Committed));
    }

    #[test]
    fn test_drop_without_commit_records_rollback() {
        let locks = LockCoordinator::new();
        let guard = locks
            .acquire_structural(PARENT, "t", Duration::from_secs(1))
            .unwrap();
        drop(guard);
        assert_eq!(locks.last_outcome(PARENT), Some(TxnOutcome::RolledBack));
    }

    #[test]
    fn test_second_acquire_times_out_while_held() {
        let locks = LockCoordinator::new();
        let _guard = locks
            .acquire_structural(PARENT, "t", Duration::from_secs(1))
            .unwrap();
        let result = locks.acquire_structural(PARENT, "t", Duration::from_millis(20));
        assert!(matches!(result, Err(LockError::Timeout { .. })));
        // The abandoned ticket must not wedge the queue.
        drop(_guard);
        let guard = locks
            .acquire_structural(PARENT, "t", Duration::from_millis(100))
            .unwrap();
        drop(guard);
    }

    #[test]
    fn test_unrelated_parents_do_not_contend() {
        let locks = LockCoordinator::new();
        let _a = locks
            .acquire_structural(RelationId(1), "a", Duration::from_secs(1))
            .unwrap();
        let _b = locks
            .acquire_structural(RelationId(2), "b", Duration::from_secs(1))
            .unwrap();
    }

    #[test]
    fn test_waiters_served_in_arrival_order() {
        let locks = Arc::new(LockCoordinator::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = locks
            .acquire_structural(PARENT, "t", Duration::from_secs(5))
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..3u64 {
            let locks_t = locks.clone();
            let order = order.clone();
            handles.push(thread::spawn(move || {
                let guard = locks_t
                    .acquire_structural(PARENT, "t", Duration::from_secs(5))
                    .unwrap();
                order.lock().push(i);
                guard.commit();
            }));
            // Give each waiter time to enqueue before the next arrives.
            while locks.pending_structural(PARENT) < i + 2 {
                thread::yield_now();
            }
        }

        assert!(order.lock().is_empty(), "waiters blocked while held");
        first.commit();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock(), vec![0u64, 1, 2]);
    }

    #[test]
    fn test_readers_share_and_only_publish_blocks_them() {
        let locks = Arc::new(LockCoordinator::new());

        // Many concurrent readers.
        let r1 = locks.read(PARENT);
        let r2 = locks.read(PARENT);

        // A structural holder outside its publish window does not block a
        // new reader.
        let guard = locks
            .acquire_structural(PARENT, "t", Duration::from_secs(1))
            .unwrap();
        let r3 = locks.read(PARENT);
        drop((r1, r2, r3));

        let entered = Arc::new(AtomicUsize::new(0));
        let reader = guard.publish(|| {
            // Spawn the reader inside the publish window so its read attempt
            // is guaranteed to land while publishing is set.
            let entered_t = entered.clone();
            let locks_r = locks.clone();
            let handle = thread::spawn(move || {
                let _r = locks_r.read(PARENT);
                entered_t.store(1, Ordering::SeqCst);
            });
            thread::sleep(Duration::from_millis(50));
            assert_eq!(
                entered.load(Ordering::SeqCst),
                0,
                "reader must not get through mid-publish"
            );
            handle
        });

        reader.join().unwrap();
        assert_eq!(entered.load(Ordering::SeqCst), 1);
        guard.commit();
    }

    #[test]
    fn test_publish_waits_for_active_readers() {
        let locks = Arc::new(LockCoordinator::new());
        let reader = locks.read(PARENT);

        let locks2 = locks.clone();
        let published = Arc::new(AtomicUsize::new(0));
        let published2 = published.clone();
        let writer = thread::spawn(move || {
            let guard = locks2
                .acquire_structural(PARENT, "t", Duration::from_secs(5))
                .unwrap();
            guard.publish(|| published2.store(1, Ordering::SeqCst));
            guard.commit();
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(published.load(Ordering::SeqCst), 0, "publish waits for reader");
        drop(reader);
        writer.join().unwrap();
        assert_eq!(published.load(Ordering::SeqCst), 1);
    }
}
