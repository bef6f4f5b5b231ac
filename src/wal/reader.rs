//! Sequential log reader with strict corruption detection.
//!
//! Used when reopening a log to find where the offset sequence left off,
//! and by recovery tooling to replay records in order. Corruption is
//! terminal: no skipping, no repair, no partial result past the damage.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::wal::errors::{WalError, WalResult};
use crate::wal::record::{LogRecord, RECORD_OVERHEAD};

/// Reads framed records from a log file front to back.
pub struct WalReader {
    wal_path: PathBuf,
    reader: BufReader<File>,
    current_pos: u64,
    file_size: u64,
    last_offset: u64,
}

impl WalReader {
    /// Open a log file for sequential reading.
    pub fn open(wal_path: &Path) -> WalResult<Self> {
        let file = File::open(wal_path).map_err(|e| {
            WalError::corruption(0, format!("failed to open WAL file: {}", e))
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| WalError::corruption(0, format!("failed to stat WAL file: {}", e)))?
            .len();

        Ok(Self {
            wal_path: wal_path.to_path_buf(),
            reader: BufReader::new(file),
            current_pos: 0,
            file_size,
            last_offset: 0,
        })
    }

    /// Path of the log file being read.
    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Log offset of the last successfully read record, 0 before any.
    pub fn last_offset(&self) -> u64 {
        self.last_offset
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at a clean end of file. Anything else that stops
    /// the read (truncation mid-record, checksum mismatch, offsets out of
    /// sequence) is `Corruption`.
    pub fn read_next(&mut self) -> WalResult<Option<LogRecord>> {
        if self.current_pos >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_pos;
        if remaining < RECORD_OVERHEAD as u64 {
            return Err(WalError::corruption(
                self.current_pos,
                format!(
                    "truncated log: {} bytes remaining, framing needs {}",
                    remaining, RECORD_OVERHEAD
                ),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            WalError::corruption(self.current_pos, format!("failed to read record length: {}", e))
        })?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        if record_length < RECORD_OVERHEAD as u64 || record_length > remaining {
            return Err(WalError::corruption(
                self.current_pos,
                format!("implausible record length {}", record_length),
            ));
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut record_buf[4..]).map_err(|e| {
            WalError::corruption(self.current_pos, format!("failed to read record body: {}", e))
        })?;

        let (record, consumed) = LogRecord::decode(&record_buf, self.current_pos)?;

        if record.offset != self.last_offset + 1 {
            return Err(WalError::corruption(
                self.current_pos,
                format!(
                    "offset out of sequence: expected {}, found {}",
                    self.last_offset + 1,
                    record.offset
                ),
            ));
        }

        self.current_pos += consumed as u64;
        self.last_offset = record.offset;
        Ok(Some(record))
    }
}
