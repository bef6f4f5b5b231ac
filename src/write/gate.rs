//! The write gate: front door of the write path.
//!
//! One gate per store. It resolves each mutation's effective durability,
//! encodes the payload, and hands it to the flush coordinator, returning
//! the coordinator's completion handle unchanged.

use std::path::Path;
use std::sync::Arc;

use crate::durability::{resolve, DurabilityLevel, TableDefaults};
use crate::wal::{FileAppender, FlushConfig, FlushCoordinator, WalError, WalResult, WriteHandle};
use crate::write::mutation::Mutation;

/// Store-level write-path options, fixed at startup.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Durability applied when neither the mutation nor its table chooses.
    /// Must be a concrete level.
    pub default_durability: DurabilityLevel,
    /// Round-batching configuration for the flush coordinator.
    pub flush: FlushConfig,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            default_durability: DurabilityLevel::SyncWal,
            flush: FlushConfig::default(),
        }
    }
}

/// Accepts mutations and returns their completion handles.
pub struct WriteGate {
    coordinator: FlushCoordinator,
    tables: Arc<dyn TableDefaults>,
    store_default: DurabilityLevel,
}

impl WriteGate {
    /// Build a gate over an existing coordinator.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when the store-wide default is
    /// `UseDefault`. This is the one place that invariant is checked;
    /// per-mutation resolution relies on it afterwards.
    pub fn new(
        coordinator: FlushCoordinator,
        tables: Arc<dyn TableDefaults>,
        store_default: DurabilityLevel,
    ) -> WalResult<Self> {
        if !store_default.is_concrete() {
            return Err(WalError::InvalidConfiguration);
        }
        Ok(Self {
            coordinator,
            tables,
            store_default,
        })
    }

    /// Open the full write path over a file-backed log in `data_dir`.
    pub fn open(
        data_dir: &Path,
        tables: Arc<dyn TableDefaults>,
        options: StoreOptions,
    ) -> WalResult<Self> {
        let appender = Arc::new(FileAppender::open(data_dir)?);
        let coordinator = FlushCoordinator::new(appender, options.flush);
        Self::new(coordinator, tables, options.default_durability)
    }

    /// The store-wide default durability.
    pub fn store_default(&self) -> DurabilityLevel {
        self.store_default
    }

    /// The coordinator backing this gate.
    pub fn coordinator(&self) -> &FlushCoordinator {
        &self.coordinator
    }

    /// Accept one mutation.
    ///
    /// Resolves the effective durability from the mutation's request, the
    /// table default, and the store-wide default; encodes the payload;
    /// submits it; returns the coordinator's handle unchanged.
    ///
    /// # Errors
    ///
    /// `Serialization` when the payload cannot be encoded, surfaced here
    /// before anything reaches the log, so an unencodable mutation is
    /// never partially appended.
    pub fn write(&self, mutation: Mutation) -> WalResult<WriteHandle> {
        let table_default = self.tables.table_default(mutation.table());
        let effective = resolve(mutation.durability(), table_default, self.store_default)?;
        let payload = mutation.encode()?;
        self.coordinator.submit(&payload, effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::durability::{StaticTableDefaults, TableDurabilityConfig};

    fn gate_with(
        dir: &TempDir,
        tables: StaticTableDefaults,
        store_default: DurabilityLevel,
    ) -> WriteGate {
        WriteGate::open(
            dir.path(),
            Arc::new(tables),
            StoreOptions {
                default_durability: store_default,
                flush: FlushConfig::immediate(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_gate_rejects_use_default_store_default() {
        let dir = TempDir::new().unwrap();
        let result = WriteGate::open(
            dir.path(),
            Arc::new(StaticTableDefaults::new()),
            StoreOptions {
                default_durability: DurabilityLevel::UseDefault,
                flush: FlushConfig::immediate(),
            },
        );
        assert!(matches!(result, Err(WalError::InvalidConfiguration)));
    }

    #[test]
    fn test_write_completes_at_store_default() {
        let dir = TempDir::new().unwrap();
        let gate = gate_with(&dir, StaticTableDefaults::new(), DurabilityLevel::SyncWal);

        let handle = gate
            .write(Mutation::put("users", "alice", json!({"n": 1})))
            .unwrap();
        assert_eq!(handle.wait().unwrap(), 1);

        let counters = gate.coordinator().counters();
        assert_eq!(counters.records_appended, 1);
        assert!(counters.sync_flushes >= 1);
    }

    #[test]
    fn test_table_default_overrides_store_default() {
        let dir = TempDir::new().unwrap();
        let tables = StaticTableDefaults::new().with_table(
            "metrics",
            TableDurabilityConfig::new(DurabilityLevel::SkipWal).unwrap(),
        );
        let gate = gate_with(&dir, tables, DurabilityLevel::SyncWal);

        // SKIP_WAL via the table default: completes without any flush.
        let handle = gate
            .write(Mutation::put("metrics", "cpu", json!(0.93)))
            .unwrap();
        assert!(handle.is_complete());
    }

    #[test]
    fn test_mutation_request_overrides_table_default() {
        let dir = TempDir::new().unwrap();
        let tables = StaticTableDefaults::new().with_table(
            "metrics",
            TableDurabilityConfig::new(DurabilityLevel::SkipWal).unwrap(),
        );
        let gate = gate_with(&dir, tables, DurabilityLevel::SyncWal);

        let handle = gate
            .write(
                Mutation::put("metrics", "cpu", json!(0.93))
                    .with_durability(DurabilityLevel::SyncWal),
            )
            .unwrap();
        handle.wait().unwrap();

        assert!(gate.coordinator().counters().sync_flushes >= 1);
    }

    #[test]
    fn test_serialization_failure_never_reaches_log() {
        let dir = TempDir::new().unwrap();
        let gate = gate_with(&dir, StaticTableDefaults::new(), DurabilityLevel::SyncWal);

        let err = gate.write(Mutation::batch("users", vec![])).unwrap_err();
        assert!(matches!(err, WalError::Serialization(_)));
        assert_eq!(gate.coordinator().counters().records_appended, 0);
    }

    #[test]
    fn test_handles_fire_in_submission_order() {
        let dir = TempDir::new().unwrap();
        let gate = gate_with(&dir, StaticTableDefaults::new(), DurabilityLevel::SyncWal);

        let h1 = gate.write(Mutation::put("t", "a", json!(1))).unwrap();
        let h2 = gate.write(Mutation::put("t", "b", json!(2))).unwrap();
        let h3 = gate.write(Mutation::delete("t", "a")).unwrap();

        assert_eq!(h1.wait().unwrap(), 1);
        assert_eq!(h2.wait().unwrap(), 2);
        assert_eq!(h3.wait().unwrap(), 3);
    }
}
