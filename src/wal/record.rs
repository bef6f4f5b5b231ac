//! On-log record framing.
//!
//! Each record is framed as:
//!
//! - record length (u32 LE, includes this field and the checksum)
//! - log offset (u64 LE)
//! - payload (variable, opaque to this layer)
//! - checksum (u32 LE, CRC32 over length prefix and body)
//!
//! The payload is the encoded mutation; the framing layer never looks
//! inside it. Records are individually parseable so a reader can walk the
//! log without any out-of-band index.

use crate::wal::checksum::{compute_checksum, verify_checksum};
use crate::wal::errors::{WalError, WalResult};

/// Framing overhead: length prefix + offset + checksum.
pub const RECORD_OVERHEAD: usize = 4 + 8 + 4;

/// One framed log record: a payload bound to its log offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Monotonically increasing position in the log stream.
    pub offset: u64,
    /// Encoded mutation bytes.
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Bind a payload to its assigned offset.
    pub fn new(offset: u64, payload: Vec<u8>) -> Self {
        Self { offset, payload }
    }

    /// Total framed size in bytes.
    pub fn framed_len(&self) -> usize {
        RECORD_OVERHEAD + self.payload.len()
    }

    /// Serialize the record with length prefix and checksum.
    pub fn encode(&self) -> Vec<u8> {
        let record_length = self.framed_len() as u32;

        let mut buf = Vec::with_capacity(self.framed_len());
        buf.extend_from_slice(&record_length.to_le_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.payload);

        // Checksum covers everything written so far.
        let checksum = compute_checksum(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());

        buf
    }

    /// Decode one record from the front of `data`.
    ///
    /// Returns the record and the number of bytes consumed. `at` is the
    /// byte position of the record in the log, used only for error
    /// reporting.
    ///
    /// # Errors
    ///
    /// `Corruption` when the buffer is truncated mid-record, the length
    /// field is implausible, or the checksum does not match.
    pub fn decode(data: &[u8], at: u64) -> WalResult<(Self, usize)> {
        if data.len() < RECORD_OVERHEAD {
            return Err(WalError::corruption(
                at,
                format!(
                    "truncated record: {} bytes remaining, framing needs {}",
                    data.len(),
                    RECORD_OVERHEAD
                ),
            ));
        }

        let record_length =
            u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if record_length < RECORD_OVERHEAD {
            return Err(WalError::corruption(
                at,
                format!("implausible record length {}", record_length),
            ));
        }
        if data.len() < record_length {
            return Err(WalError::corruption(
                at,
                format!(
                    "truncated record: length field says {} bytes, {} remain",
                    record_length,
                    data.len()
                ),
            ));
        }

        let checksum_at = record_length - 4;
        let stored = u32::from_le_bytes([
            data[checksum_at],
            data[checksum_at + 1],
            data[checksum_at + 2],
            data[checksum_at + 3],
        ]);
        if !verify_checksum(&data[..checksum_at], stored) {
            return Err(WalError::corruption(at, "checksum mismatch"));
        }

        let offset = u64::from_le_bytes([
            data[4], data[5], data[6], data[7], data[8], data[9], data[10], data[11],
        ]);
        let payload = data[12..checksum_at].to_vec();

        Ok((Self { offset, payload }, record_length))
    }
}
