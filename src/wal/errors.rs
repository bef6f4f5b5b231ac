//! WAL error types.
//!
//! Errors are cheap to clone: a single failed flush fans out to every
//! completion handle batched into the affected round, so the underlying
//! I/O error is flattened to a message instead of being carried by value.

use thiserror::Error;

/// Errors surfaced by the durability and flush-coordination subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalError {
    /// The store-wide default durability resolves to `USE_DEFAULT`.
    /// Fatal at startup; the write gate refuses construction rather than
    /// re-checking per mutation.
    #[error("store-wide default durability must be a concrete level")]
    InvalidConfiguration,

    /// A mutation payload could not be encoded. Surfaced to the original
    /// caller before anything reaches the log; never a partial append.
    #[error("failed to encode mutation: {0}")]
    Serialization(String),

    /// A flush or sync call against the log failed. Every handle in the
    /// round in flight receives this; the round is abandoned without
    /// retry.
    #[error("WAL write failed: {0}")]
    WriteFailed(String),

    /// A log record failed validation while being read back.
    #[error("WAL corruption at offset {offset}: {reason}")]
    Corruption {
        /// Byte offset of the damaged record.
        offset: u64,
        /// What failed to validate.
        reason: String,
    },

    /// The caller abandoned its wait on a completion handle. The append
    /// and flush still proceed; only the wait is given up.
    #[error("timed out waiting for durability acknowledgment")]
    Timeout,
}

impl WalError {
    /// Wrap an I/O failure from a flush or sync call.
    pub fn write_failed(context: &str, err: std::io::Error) -> Self {
        WalError::WriteFailed(format!("{}: {}", context, err))
    }

    /// Corruption at a known byte offset.
    pub fn corruption(offset: u64, reason: impl Into<String>) -> Self {
        WalError::Corruption {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type for WAL operations.
pub type WalResult<T> = Result<T, WalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_failed_keeps_context() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = WalError::write_failed("flush of segment 3", io);
        let text = err.to_string();
        assert!(text.contains("flush of segment 3"));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn test_errors_clone_for_fan_out() {
        let err = WalError::write_failed(
            "sync",
            std::io::Error::new(std::io::ErrorKind::Other, "io"),
        );
        let copies: Vec<WalError> = (0..3).map(|_| err.clone()).collect();
        assert!(copies.iter().all(|c| *c == err));
    }

    #[test]
    fn test_corruption_display_includes_offset() {
        let err = WalError::corruption(128, "checksum mismatch");
        assert!(err.to_string().contains("128"));
        assert!(err.to_string().contains("checksum mismatch"));
    }
}
