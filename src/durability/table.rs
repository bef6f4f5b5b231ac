//! Per-table durability configuration.
//!
//! Tables are created and altered by the schema subsystem; the write path
//! only ever reads their configured default, once per mutation.

use std::collections::HashMap;

use super::level::DurabilityLevel;
use crate::wal::errors::{WalError, WalResult};

/// Durability settings attached to one table.
///
/// The configured level is always concrete; a table that wants to defer to
/// the store-wide default simply has no config entry. Immutable between
/// table alterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDurabilityConfig {
    default_durability: DurabilityLevel,
}

impl TableDurabilityConfig {
    /// Create a config with the given default level.
    ///
    /// # Errors
    ///
    /// Rejects `UseDefault`: a table default must itself be a concrete
    /// level so resolution terminates at the table tier.
    pub fn new(default_durability: DurabilityLevel) -> WalResult<Self> {
        if !default_durability.is_concrete() {
            return Err(WalError::InvalidConfiguration);
        }
        Ok(Self { default_durability })
    }

    /// The level applied to mutations that do not request their own.
    pub fn default_durability(&self) -> DurabilityLevel {
        self.default_durability
    }
}

/// Read-only source of per-table durability defaults.
///
/// Called once per mutation by the write gate. Tables without an explicit
/// configuration report `UseDefault`, which resolution replaces with the
/// store-wide default.
pub trait TableDefaults: Send + Sync {
    /// The configured default for `table`, or `UseDefault` when the table
    /// has none.
    fn table_default(&self, table: &str) -> DurabilityLevel;
}

/// Map-backed [`TableDefaults`] built up-front from table metadata.
#[derive(Debug, Default)]
pub struct StaticTableDefaults {
    tables: HashMap<String, TableDurabilityConfig>,
}

impl StaticTableDefaults {
    /// Empty set: every table falls through to the store-wide default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table's durability config, replacing any previous entry.
    pub fn insert(&mut self, table: impl Into<String>, config: TableDurabilityConfig) {
        self.tables.insert(table.into(), config);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_table(mut self, table: impl Into<String>, config: TableDurabilityConfig) -> Self {
        self.insert(table, config);
        self
    }
}

impl TableDefaults for StaticTableDefaults {
    fn table_default(&self, table: &str) -> DurabilityLevel {
        self.tables
            .get(table)
            .map(|c| c.default_durability())
            .unwrap_or(DurabilityLevel::UseDefault)
    }
}
