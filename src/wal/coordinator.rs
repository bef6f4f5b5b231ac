//! The flush coordinator: batches appends into rounds and drives the log
//! to the strongest guarantee each round requires.
//!
//! Concurrent writers fan into a single open [`FlushRound`]. A dedicated
//! flusher thread detaches the round, issues exactly one flush call at the
//! round's required level, and fires every member handle in append order.
//! Writers submitting while a flush is in flight land in the next open
//! round, so an in-flight flush never blocks new submissions. That is the
//! whole throughput/latency trade: N concurrent sync writers share one
//! sync instead of paying for N.

use std::mem;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::durability::DurabilityLevel;
use crate::wal::appender::LogAppender;
use crate::wal::errors::{WalError, WalResult};
use crate::wal::handle::WriteHandle;
use crate::wal::round::FlushRound;

/// Tuning knobs for round batching.
#[derive(Debug, Clone)]
pub struct FlushConfig {
    /// How long the flusher lingers after waking before it closes the
    /// round, letting concurrently arriving writers share the flush.
    /// Zero (the default) closes the round as soon as the flusher runs.
    pub batch_window: Duration,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            batch_window: Duration::ZERO,
        }
    }
}

impl FlushConfig {
    /// Flush as soon as a waiting member appears.
    pub fn immediate() -> Self {
        Self::default()
    }

    /// Hold rounds open for `window` to amortize flush cost across
    /// concurrent writers, at the price of added latency.
    pub fn with_batch_window(window: Duration) -> Self {
        Self {
            batch_window: window,
        }
    }
}

/// Cumulative coordinator counters. Never reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushCounters {
    /// Payloads staged through [`FlushCoordinator::submit`].
    pub records_appended: u64,
    /// Rounds driven to completion, successfully or not.
    pub rounds_flushed: u64,
    /// Rounds whose required level took a blocking flush (sync or force).
    pub sync_flushes: u64,
    /// Rounds satisfied by handing the buffer to background I/O.
    pub async_flushes: u64,
    /// Rounds whose flush call failed.
    pub flush_failures: u64,
}

/// State shared between submitters and the flusher thread.
struct CoordInner {
    open: FlushRound,
    next_round_id: u64,
    shutdown: bool,
    counters: FlushCounters,
}

struct Shared {
    appender: Arc<dyn LogAppender>,
    config: FlushConfig,
    inner: Mutex<CoordInner>,
    wake: Condvar,
}

/// Batches concurrent appends and fans out completion once each round's
/// durability requirement is met.
pub struct FlushCoordinator {
    shared: Arc<Shared>,
    flusher: Option<JoinHandle<()>>,
}

impl FlushCoordinator {
    /// Start a coordinator over `appender` with the given batching config.
    pub fn new(appender: Arc<dyn LogAppender>, config: FlushConfig) -> Self {
        let shared = Arc::new(Shared {
            appender,
            config,
            inner: Mutex::new(CoordInner {
                open: FlushRound::new(0),
                next_round_id: 1,
                shutdown: false,
                counters: FlushCounters::default(),
            }),
            wake: Condvar::new(),
        });

        let flusher = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("cirrusdb-wal-flush".to_string())
                .spawn(move || Self::flusher_loop(&shared))
                .expect("failed to spawn WAL flusher thread")
        };

        Self {
            shared,
            flusher: Some(flusher),
        }
    }

    /// Stage a payload at `effective` durability and return its completion
    /// handle.
    ///
    /// The payload always enters the log buffer, even for `SKIP_WAL`,
    /// whose records keep their place in replay order. The handle
    /// completes immediately for `SKIP_WAL` and at round closure for
    /// everything stronger.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when handed an unresolved `USE_DEFAULT`
    /// level; staging errors from the appender pass through.
    pub fn submit(
        &self,
        payload: &[u8],
        effective: DurabilityLevel,
    ) -> WalResult<WriteHandle> {
        if !effective.is_concrete() {
            return Err(WalError::InvalidConfiguration);
        }

        // Single critical section: staging append, round membership, and
        // required-level computation move together so global append order
        // matches round order.
        let mut inner = self.shared.inner.lock().unwrap();
        let offset = self.shared.appender.append(payload)?;
        inner.counters.records_appended += 1;

        if effective == DurabilityLevel::SkipWal {
            inner.open.push(offset, effective, None);
            return Ok(WriteHandle::completed(offset));
        }

        let (handle, completer) = WriteHandle::pending(offset);
        inner.open.push(offset, effective, Some(completer));
        drop(inner);

        self.shared.wake.notify_one();
        Ok(handle)
    }

    /// Snapshot of the cumulative counters.
    pub fn counters(&self) -> FlushCounters {
        self.shared.inner.lock().unwrap().counters
    }

    /// Required level of the currently open round. Exposed for
    /// observability; the value is stale the moment the lock drops.
    pub fn open_round_required_level(&self) -> DurabilityLevel {
        self.shared.inner.lock().unwrap().open.required_level()
    }

    fn flusher_loop(shared: &Shared) {
        let mut inner = shared.inner.lock().unwrap();
        loop {
            while !inner.shutdown && !inner.open.has_waiters() {
                inner = shared.wake.wait(inner).unwrap();
            }
            if inner.shutdown && !inner.open.has_waiters() {
                return;
            }

            // Linger so concurrent writers can join the round. Cut short
            // on shutdown so the final drain completes promptly.
            if !shared.config.batch_window.is_zero() && !inner.shutdown {
                let deadline = Instant::now() + shared.config.batch_window;
                while !inner.shutdown {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let (guard, _) = shared.wake.wait_timeout(inner, deadline - now).unwrap();
                    inner = guard;
                }
            }

            let next_id = inner.next_round_id;
            inner.next_round_id += 1;
            let mut round = mem::replace(&mut inner.open, FlushRound::new(next_id));
            round.begin_flush();
            drop(inner);

            // The flush call runs outside the membership critical section;
            // submissions into the new open round proceed concurrently.
            let outcome = Self::flush_round(shared.appender.as_ref(), &mut round);

            inner = shared.inner.lock().unwrap();
            inner.counters.rounds_flushed += 1;
            if outcome.is_err() {
                inner.counters.flush_failures += 1;
            } else if round.required_level().requires_blocking_flush() {
                inner.counters.sync_flushes += 1;
            } else if round.required_level() == DurabilityLevel::AsyncWal {
                inner.counters.async_flushes += 1;
            }
        }
    }

    /// Issue the round's single flush call and fire its handles.
    fn flush_round(appender: &dyn LogAppender, round: &mut FlushRound) -> WalResult<()> {
        let up_to = round.last_offset();
        let outcome = match round.required_level() {
            // A round can only reach the flusher with waiters, but a
            // weaker level here still needs no flush call.
            DurabilityLevel::UseDefault | DurabilityLevel::SkipWal => Ok(()),
            DurabilityLevel::AsyncWal => appender.flush_async(up_to).map(|_| ()),
            DurabilityLevel::SyncWal => appender.flush_sync(up_to),
            DurabilityLevel::FsyncWal => appender.force_disk(up_to),
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    round = round.id(),
                    members = round.len(),
                    level = %round.required_level(),
                    up_to,
                    "flush round closed"
                );
                round.complete_all();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    round = round.id(),
                    members = round.len(),
                    level = %round.required_level(),
                    error = %err,
                    "flush round failed"
                );
                round.fail_all(&err);
                Err(err)
            }
        }
    }
}

impl Drop for FlushCoordinator {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.shutdown = true;
        }
        self.shared.wake.notify_all();
        if let Some(flusher) = self.flusher.take() {
            if flusher.join().is_err() {
                tracing::warn!("WAL flusher thread panicked during shutdown");
            }
        }
    }
}
