//! File-backed log appender.
//!
//! Appending stages framed records in memory and never touches the file;
//! all I/O funnels through a single background writer thread. Requests reach
//! the writer over a FIFO channel, which is what keeps the ordering
//! guarantee: a blocking flush queued after asynchronous flushes cannot
//! reach the medium before them.
//!
//! A failed write or sync poisons the appender: the error is sticky and
//! every later staging or flush call reports it. Retry policy belongs to
//! the caller; this layer only promises to never report a guarantee it did
//! not obtain.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::wal::appender::{FlushTicket, LogAppender};
use crate::wal::errors::{WalError, WalResult};
use crate::wal::reader::WalReader;
use crate::wal::record::LogRecord;

/// Staged records not yet handed to the writer thread.
struct Staging {
    next_offset: u64,
    buffered: VecDeque<LogRecord>,
}

/// One unit of work for the writer thread.
struct FlushRequest {
    records: Vec<LogRecord>,
    up_to: u64,
    force: bool,
    /// Present for blocking flushes; the writer reports the outcome here.
    ack: Option<Sender<WalResult<()>>>,
}

/// State shared with the writer thread.
struct WriterShared {
    durable: AtomicU64,
    /// Cleared the first time the medium rejects a forced sync; after
    /// that, force requests degrade to plain sync without complaint.
    force_supported: AtomicBool,
    sticky_error: Mutex<Option<WalError>>,
}

/// [`LogAppender`] over a single append-only log file.
///
/// Records live at `<data_dir>/wal/wal.log`. Reopening scans the existing
/// file so the offset sequence continues where the previous process left
/// off.
pub struct FileAppender {
    wal_path: PathBuf,
    staging: Mutex<Staging>,
    shared: Arc<WriterShared>,
    io_tx: Mutex<Option<Sender<FlushRequest>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl FileAppender {
    /// Open or create the log under `data_dir`, continuing the offset
    /// sequence of any existing records.
    pub fn open(data_dir: &Path) -> WalResult<Self> {
        let wal_dir = data_dir.join("wal");
        let wal_path = wal_dir.join("wal.log");

        fs::create_dir_all(&wal_dir)
            .map_err(|e| WalError::write_failed("failed to create WAL directory", e))?;

        let last_offset = Self::scan_last_offset(&wal_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wal_path)
            .map_err(|e| WalError::write_failed("failed to open WAL file", e))?;

        let shared = Arc::new(WriterShared {
            durable: AtomicU64::new(last_offset),
            force_supported: AtomicBool::new(true),
            sticky_error: Mutex::new(None),
        });

        let (io_tx, io_rx) = mpsc::channel();
        let writer = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("cirrusdb-wal-io".to_string())
                .spawn(move || Self::writer_loop(file, io_rx, &shared))
                .expect("failed to spawn WAL writer thread")
        };

        Ok(Self {
            wal_path,
            staging: Mutex::new(Staging {
                next_offset: last_offset + 1,
                buffered: VecDeque::new(),
            }),
            shared,
            io_tx: Mutex::new(Some(io_tx)),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Walk an existing log to find the highest offset, or 0 for a fresh
    /// or absent file.
    fn scan_last_offset(wal_path: &Path) -> WalResult<u64> {
        match fs::metadata(wal_path) {
            Ok(meta) if meta.len() == 0 => return Ok(0),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(WalError::write_failed("failed to stat WAL file", e)),
        }

        let mut reader = WalReader::open(wal_path)?;
        let mut last = 0u64;
        while let Some(record) = reader.read_next()? {
            last = last.max(record.offset);
        }
        Ok(last)
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Number of staged records not yet handed to the writer.
    pub fn pending_records(&self) -> usize {
        self.staging.lock().unwrap().buffered.len()
    }

    fn check_sticky(&self) -> WalResult<()> {
        match &*self.shared.sticky_error.lock().unwrap() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Drain staged records up to `up_to` and queue them for the writer.
    ///
    /// Draining and sending happen under the staging lock so two
    /// concurrent flushes cannot interleave their batches out of offset
    /// order on the channel.
    fn enqueue_flush(
        &self,
        up_to: u64,
        force: bool,
        ack: Option<Sender<WalResult<()>>>,
    ) -> WalResult<()> {
        let mut staging = self.staging.lock().unwrap();

        let mut records = Vec::new();
        while staging
            .buffered
            .front()
            .map(|r| r.offset <= up_to)
            .unwrap_or(false)
        {
            if let Some(record) = staging.buffered.pop_front() {
                records.push(record);
            }
        }

        let tx = self.io_tx.lock().unwrap();
        let tx = tx
            .as_ref()
            .ok_or_else(|| WalError::WriteFailed("log writer is shut down".into()))?;
        tx.send(FlushRequest {
            records,
            up_to,
            force,
            ack,
        })
        .map_err(|_| WalError::WriteFailed("log writer thread unavailable".into()))
    }

    fn writer_loop(mut file: File, io_rx: Receiver<FlushRequest>, shared: &WriterShared) {
        for request in io_rx {
            let result = Self::write_and_sync(&mut file, &request, shared);

            match &result {
                Ok(()) => {
                    shared.durable.fetch_max(request.up_to, Ordering::SeqCst);
                }
                Err(err) => {
                    tracing::warn!(up_to = request.up_to, error = %err, "WAL write failed");
                    let mut sticky = shared.sticky_error.lock().unwrap();
                    if sticky.is_none() {
                        *sticky = Some(err.clone());
                    }
                }
            }

            if let Some(ack) = request.ack {
                // The flushing caller may have abandoned its wait.
                let _ = ack.send(result);
            }
        }
    }

    fn write_and_sync(
        file: &mut File,
        request: &FlushRequest,
        shared: &WriterShared,
    ) -> WalResult<()> {
        if let Some(err) = &*shared.sticky_error.lock().unwrap() {
            return Err(err.clone());
        }

        for record in &request.records {
            file.write_all(&record.encode())
                .map_err(|e| WalError::write_failed("failed to write WAL record", e))?;
        }

        if request.force && shared.force_supported.load(Ordering::SeqCst) {
            match file.sync_all() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                    // Degrade to plain sync from here on; never fail a
                    // flush solely because the medium cannot force.
                    shared.force_supported.store(false, Ordering::SeqCst);
                    tracing::warn!(
                        "storage medium does not support forced sync; \
                         degrading FSYNC_WAL to SYNC_WAL behavior"
                    );
                }
                Err(e) => return Err(WalError::write_failed("WAL force-sync failed", e)),
            }
        }

        file.sync_data()
            .map_err(|e| WalError::write_failed("WAL sync failed", e))
    }
}

impl LogAppender for FileAppender {
    fn append(&self, payload: &[u8]) -> WalResult<u64> {
        self.check_sticky()?;
        let mut staging = self.staging.lock().unwrap();
        let offset = staging.next_offset;
        staging.next_offset += 1;
        staging
            .buffered
            .push_back(LogRecord::new(offset, payload.to_vec()));
        Ok(offset)
    }

    fn flush_async(&self, up_to: u64) -> WalResult<FlushTicket> {
        self.check_sticky()?;
        self.enqueue_flush(up_to, false, None)?;
        Ok(FlushTicket::new(up_to))
    }

    fn flush_sync(&self, up_to: u64) -> WalResult<()> {
        self.check_sticky()?;
        let (ack_tx, ack_rx) = mpsc::channel();
        self.enqueue_flush(up_to, false, Some(ack_tx))?;
        ack_rx
            .recv()
            .map_err(|_| WalError::WriteFailed("log writer thread unavailable".into()))?
    }

    fn force_disk(&self, up_to: u64) -> WalResult<()> {
        self.check_sticky()?;
        let (ack_tx, ack_rx) = mpsc::channel();
        self.enqueue_flush(up_to, true, Some(ack_tx))?;
        ack_rx
            .recv()
            .map_err(|_| WalError::WriteFailed("log writer thread unavailable".into()))?
    }

    fn durable_offset(&self) -> u64 {
        self.shared.durable.load(Ordering::SeqCst)
    }
}

impl Drop for FileAppender {
    fn drop(&mut self) {
        // Final flush of anything still staged, then stop the writer.
        let up_to = {
            let staging = self.staging.lock().unwrap();
            staging.next_offset.saturating_sub(1)
        };
        if let Err(err) = self.flush_sync(up_to) {
            tracing::warn!(error = %err, "final WAL flush on shutdown failed");
        }

        self.io_tx.lock().unwrap().take();
        if let Some(writer) = self.writer.lock().unwrap().take() {
            if writer.join().is_err() {
                tracing::warn!("WAL writer thread panicked during shutdown");
            }
        }
    }
}
