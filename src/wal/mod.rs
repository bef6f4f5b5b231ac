//! Write-ahead log subsystem: append staging, flush coordination, and the
//! completion signals that gate write acknowledgment.
//!
//! No mutation is acknowledged at a durability level the log has not
//! actually reached. The coordinator batches concurrent appends into
//! rounds so one flush call satisfies every writer in the round, and the
//! appender keeps file I/O on a single background thread so staging never
//! blocks on the medium.

mod appender;
mod checksum;
mod coordinator;
pub mod errors;
mod file_appender;
mod handle;
mod reader;
mod record;
mod round;

pub use appender::{FlushTicket, LogAppender};
pub use checksum::{compute_checksum, verify_checksum};
pub use coordinator::{FlushConfig, FlushCoordinator, FlushCounters};
pub use errors::{WalError, WalResult};
pub use file_appender::FileAppender;
pub use handle::WriteHandle;
pub use reader::WalReader;
pub use record::{LogRecord, RECORD_OVERHEAD};
pub use round::{FlushRound, RoundState};
