//! Per-mutation completion handles.
//!
//! A [`WriteHandle`] is returned to the caller the moment its mutation is
//! staged in the log. The handle fires once the mutation's resolved
//! durability guarantee is satisfied: immediately for `SKIP_WAL`, at round
//! closure for everything stronger. Every handle is eventually completed or
//! failed; the coordinator never drops one unresolved.
//!
//! Abandoning a wait (including by timeout) gives up only the caller's
//! wait. The underlying append and flush proceed regardless, preserving log
//! order for the other members of the round.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::wal::errors::{WalError, WalResult};

/// Shared completion cell between a handle and its round.
#[derive(Debug)]
struct HandleCell {
    result: Mutex<Option<WalResult<u64>>>,
    done: Condvar,
}

/// Completion signal for one submitted mutation.
#[derive(Debug, Clone)]
pub struct WriteHandle {
    cell: Arc<HandleCell>,
    offset: u64,
}

impl WriteHandle {
    /// A handle that will be fired later by its round's [`Completer`].
    pub(crate) fn pending(offset: u64) -> (Self, Completer) {
        let cell = Arc::new(HandleCell {
            result: Mutex::new(None),
            done: Condvar::new(),
        });
        let handle = Self {
            cell: Arc::clone(&cell),
            offset,
        };
        (handle, Completer { cell })
    }

    /// A handle that is already satisfied, for `SKIP_WAL` submissions that
    /// complete on buffer insertion.
    pub(crate) fn completed(offset: u64) -> Self {
        let (handle, completer) = Self::pending(offset);
        completer.complete(offset);
        handle
    }

    /// Log offset assigned to this mutation at append time.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the guarantee has been satisfied or failed.
    pub fn is_complete(&self) -> bool {
        self.cell.result.lock().unwrap().is_some()
    }

    /// Block until the durability guarantee is satisfied.
    ///
    /// Returns the mutation's log offset on success.
    pub fn wait(&self) -> WalResult<u64> {
        let mut result = self.cell.result.lock().unwrap();
        while result.is_none() {
            result = self.cell.done.wait(result).unwrap();
        }
        result.clone().unwrap()
    }

    /// As [`wait`](Self::wait), giving up after `timeout`.
    ///
    /// A `Timeout` error abandons only this wait; the handle can be waited
    /// on again and the round still completes it.
    pub fn wait_timeout(&self, timeout: Duration) -> WalResult<u64> {
        let deadline = std::time::Instant::now() + timeout;
        let mut result = self.cell.result.lock().unwrap();
        while result.is_none() {
            let now = std::time::Instant::now();
            if now >= deadline {
                return Err(WalError::Timeout);
            }
            let (guard, wait_result) = self
                .cell
                .done
                .wait_timeout(result, deadline - now)
                .unwrap();
            result = guard;
            if wait_result.timed_out() && result.is_none() {
                return Err(WalError::Timeout);
            }
        }
        result.clone().unwrap()
    }
}

/// Round-side writer of a handle's completion cell.
///
/// Exactly one of [`complete`](Self::complete) or [`fail`](Self::fail) is
/// called per handle; later calls are ignored so a round can never flip an
/// already-fired result.
#[derive(Debug)]
pub(crate) struct Completer {
    cell: Arc<HandleCell>,
}

impl Completer {
    /// Fire the handle successfully.
    pub(crate) fn complete(&self, offset: u64) {
        self.fire(Ok(offset));
    }

    /// Fail the handle.
    pub(crate) fn fail(&self, err: WalError) {
        self.fire(Err(err));
    }

    fn fire(&self, outcome: WalResult<u64>) {
        let mut result = self.cell.result.lock().unwrap();
        if result.is_none() {
            *result = Some(outcome);
            self.cell.done.notify_all();
        }
    }
}
