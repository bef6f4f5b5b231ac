//! The log-appending collaborator interface.
//!
//! The flush coordinator drives the log through this trait; it never
//! touches files itself. [`FileAppender`](crate::wal::FileAppender) is the
//! production implementation; tests substitute in-memory doubles that
//! record which flush primitives were invoked.

use crate::wal::errors::WalResult;

/// Acknowledgment that buffered records were handed to background I/O.
///
/// The ticket does not mean the records are durable, only that the
/// asynchronous writer owns them and will advance the durable watermark
/// past `up_to` in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTicket {
    up_to: u64,
}

impl FlushTicket {
    /// Create a ticket covering records up to and including `up_to`.
    pub fn new(up_to: u64) -> Self {
        Self { up_to }
    }

    /// Highest log offset covered by this ticket.
    pub fn up_to(&self) -> u64 {
        self.up_to
    }
}

/// Append and flush primitives of the underlying log.
///
/// Contract, in order of increasing persistence strength:
///
/// - [`append`](Self::append) places a payload in the staging buffer and
///   returns its monotonically increasing offset. Never blocks on I/O.
/// - [`flush_async`](Self::flush_async) hands buffered records up to an
///   offset to background I/O and returns immediately.
/// - [`flush_sync`](Self::flush_sync) blocks until records up to the
///   offset are durably written to the storage medium. Implementations
///   must never write records out of append order, so a sync flush waits
///   for previously issued async work before touching the medium.
/// - [`force_disk`](Self::force_disk) is `flush_sync` plus a request for a
///   hardware-level sync. Media that cannot force silently provide
///   `flush_sync` semantics instead; the default method body does exactly
///   that.
pub trait LogAppender: Send + Sync {
    /// Stage a payload, returning its assigned log offset.
    fn append(&self, payload: &[u8]) -> WalResult<u64>;

    /// Hand buffered records up to `up_to` to background I/O.
    fn flush_async(&self, up_to: u64) -> WalResult<FlushTicket>;

    /// Block until records up to `up_to` are durable on the medium.
    fn flush_sync(&self, up_to: u64) -> WalResult<()>;

    /// As [`flush_sync`](Self::flush_sync), additionally requesting a
    /// hardware-level sync when the medium supports one.
    fn force_disk(&self, up_to: u64) -> WalResult<()> {
        self.flush_sync(up_to)
    }

    /// Highest offset confirmed durable so far.
    fn durable_offset(&self) -> u64;
}
