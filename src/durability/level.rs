//! Durability levels for tables and mutations.
//!
//! The five levels form a total order of increasing persistence strength
//! and decreasing throughput:
//!
//! | Level | Guarantee | Cost |
//! |-------|-----------|------|
//! | [`SkipWal`](DurabilityLevel::SkipWal) | None, buffered only | Cheapest |
//! | [`AsyncWal`](DurabilityLevel::AsyncWal) | Handed to background writer | Cheap |
//! | [`SyncWal`](DurabilityLevel::SyncWal) | Flushed to the storage medium | One flush |
//! | [`FsyncWal`](DurabilityLevel::FsyncWal) | Flushed and forced to disk | One flush + force |
//!
//! [`UseDefault`](DurabilityLevel::UseDefault) is not a guarantee at all:
//! it defers to the table default, which may itself defer to the store-wide
//! default. It must always be resolved away before a mutation reaches the
//! flush coordinator.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::wal::errors::WalError;

/// Durability requested for a table or a single mutation.
///
/// Level names are stable wire identifiers: table descriptors persist them
/// as strings, so renaming a variant's canonical name is a format break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurabilityLevel {
    /// Defer to the table default; for table defaults, defer to the
    /// store-wide default. Never a terminal level.
    #[serde(rename = "USE_DEFAULT")]
    UseDefault,
    /// Do not wait for the log at all. The mutation is still placed in the
    /// log buffer so replay order stays consistent, but the caller is
    /// acknowledged on buffer insertion.
    #[serde(rename = "SKIP_WAL")]
    SkipWal,
    /// Hand the log buffer to the background writer without waiting for
    /// the write to complete.
    #[serde(rename = "ASYNC_WAL")]
    AsyncWal,
    /// Block until the log is flushed to the storage medium. The data may
    /// still sit in a hardware cache.
    #[serde(rename = "SYNC_WAL")]
    SyncWal,
    /// Block until the log is flushed and the medium is asked for a
    /// hardware-level sync. Falls back to [`SyncWal`](Self::SyncWal)
    /// behavior when the medium does not support forced sync.
    #[serde(rename = "FSYNC_WAL")]
    FsyncWal,
}

impl DurabilityLevel {
    /// Explicit ordinal rank. Comparisons go through this rather than
    /// declaration order so the total order is unambiguous.
    pub fn rank(self) -> u8 {
        match self {
            DurabilityLevel::UseDefault => 0,
            DurabilityLevel::SkipWal => 1,
            DurabilityLevel::AsyncWal => 2,
            DurabilityLevel::SyncWal => 3,
            DurabilityLevel::FsyncWal => 4,
        }
    }

    /// Whether this level is a concrete guarantee (anything but
    /// `UseDefault`).
    pub fn is_concrete(self) -> bool {
        !matches!(self, DurabilityLevel::UseDefault)
    }

    /// Whether a mutation at this level must wait for its flush round to
    /// close before it is acknowledged.
    pub fn waits_for_flush(self) -> bool {
        self.rank() >= DurabilityLevel::AsyncWal.rank()
    }

    /// Whether satisfying this level requires blocking on the storage
    /// medium (sync or stronger).
    pub fn requires_blocking_flush(self) -> bool {
        self.rank() >= DurabilityLevel::SyncWal.rank()
    }

    /// Canonical wire name, as persisted in table descriptors.
    pub fn as_str(self) -> &'static str {
        match self {
            DurabilityLevel::UseDefault => "USE_DEFAULT",
            DurabilityLevel::SkipWal => "SKIP_WAL",
            DurabilityLevel::AsyncWal => "ASYNC_WAL",
            DurabilityLevel::SyncWal => "SYNC_WAL",
            DurabilityLevel::FsyncWal => "FSYNC_WAL",
        }
    }
}

impl Default for DurabilityLevel {
    fn default() -> Self {
        DurabilityLevel::UseDefault
    }
}

impl PartialOrd for DurabilityLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DurabilityLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for DurabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurabilityLevel {
    type Err = WalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USE_DEFAULT" => Ok(DurabilityLevel::UseDefault),
            "SKIP_WAL" => Ok(DurabilityLevel::SkipWal),
            "ASYNC_WAL" => Ok(DurabilityLevel::AsyncWal),
            "SYNC_WAL" => Ok(DurabilityLevel::SyncWal),
            "FSYNC_WAL" => Ok(DurabilityLevel::FsyncWal),
            other => Err(WalError::Serialization(format!(
                "unknown durability level: {}",
                other
            ))),
        }
    }
}
