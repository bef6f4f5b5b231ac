//! Durability resolution invariants.
//!
//! Resolution must be pure, total over concrete store defaults, and must
//! never let `USE_DEFAULT` escape as an effective level.

use cirrusdb::durability::{
    resolve, DurabilityLevel, StaticTableDefaults, TableDefaults, TableDurabilityConfig,
};
use cirrusdb::wal::WalError;
use proptest::prelude::*;
use proptest::sample::select;

use DurabilityLevel::*;

const ALL_LEVELS: [DurabilityLevel; 5] = [UseDefault, SkipWal, AsyncWal, SyncWal, FsyncWal];
const CONCRETE_LEVELS: [DurabilityLevel; 4] = [SkipWal, AsyncWal, SyncWal, FsyncWal];

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn mutation_request_beats_table_and_store_defaults() {
    assert_eq!(resolve(SyncWal, AsyncWal, SkipWal).unwrap(), SyncWal);
}

#[test]
fn table_default_beats_store_default() {
    assert_eq!(resolve(UseDefault, AsyncWal, SkipWal).unwrap(), AsyncWal);
}

#[test]
fn store_default_applies_when_everything_defers() {
    assert_eq!(resolve(UseDefault, UseDefault, SyncWal).unwrap(), SyncWal);
}

#[test]
fn weaker_request_still_beats_stronger_defaults() {
    // Precedence is positional, not strength-based: an explicit SKIP_WAL
    // request wins over an FSYNC_WAL table default.
    assert_eq!(resolve(SkipWal, FsyncWal, FsyncWal).unwrap(), SkipWal);
}

// =============================================================================
// Totality and purity
// =============================================================================

proptest! {
    #[test]
    fn resolution_never_returns_use_default(
        requested in select(ALL_LEVELS.to_vec()),
        table in select(ALL_LEVELS.to_vec()),
        store in select(CONCRETE_LEVELS.to_vec()),
    ) {
        let effective = resolve(requested, table, store).unwrap();
        prop_assert!(effective.is_concrete());
    }

    #[test]
    fn resolution_is_deterministic(
        requested in select(ALL_LEVELS.to_vec()),
        table in select(ALL_LEVELS.to_vec()),
        store in select(ALL_LEVELS.to_vec()),
    ) {
        let first = resolve(requested, table, store);
        let second = resolve(requested, table, store);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn concrete_request_is_always_honored(
        requested in select(CONCRETE_LEVELS.to_vec()),
        table in select(ALL_LEVELS.to_vec()),
        store in select(ALL_LEVELS.to_vec()),
    ) {
        prop_assert_eq!(resolve(requested, table, store).unwrap(), requested);
    }
}

#[test]
fn fully_deferred_chain_is_a_configuration_error() {
    assert_eq!(
        resolve(UseDefault, UseDefault, UseDefault).unwrap_err(),
        WalError::InvalidConfiguration
    );
}

// =============================================================================
// Level ordering
// =============================================================================

#[test]
fn levels_are_totally_ordered_by_rank() {
    for window in ALL_LEVELS.windows(2) {
        assert!(window[0] < window[1]);
    }
    assert_eq!(ALL_LEVELS.iter().max(), Some(&FsyncWal));
}

#[test]
fn wire_names_are_stable() {
    let names: Vec<&str> = ALL_LEVELS.iter().map(|l| l.as_str()).collect();
    assert_eq!(
        names,
        vec!["USE_DEFAULT", "SKIP_WAL", "ASYNC_WAL", "SYNC_WAL", "FSYNC_WAL"]
    );

    for level in ALL_LEVELS {
        assert_eq!(level.as_str().parse::<DurabilityLevel>().unwrap(), level);
    }
}

// =============================================================================
// Table defaults source
// =============================================================================

#[test]
fn table_defaults_flow_through_resolution() {
    let tables = StaticTableDefaults::new()
        .with_table(
            "events",
            TableDurabilityConfig::new(AsyncWal).unwrap(),
        )
        .with_table(
            "ledger",
            TableDurabilityConfig::new(FsyncWal).unwrap(),
        );

    // Table with a configured default.
    let effective = resolve(UseDefault, tables.table_default("ledger"), SyncWal).unwrap();
    assert_eq!(effective, FsyncWal);

    // Unknown table defers to the store default.
    let effective = resolve(UseDefault, tables.table_default("unknown"), SyncWal).unwrap();
    assert_eq!(effective, SyncWal);
}

#[test]
fn table_config_cannot_hold_use_default() {
    assert_eq!(
        TableDurabilityConfig::new(UseDefault).unwrap_err(),
        WalError::InvalidConfiguration
    );
}
