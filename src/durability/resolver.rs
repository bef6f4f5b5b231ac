//! Effective-durability resolution.
//!
//! A mutation may carry its own durability request, the owning table carries
//! a default, and the store carries a process-wide default. Precedence is
//! strict: mutation over table over store. The result is always a concrete
//! level: `UseDefault` never survives resolution.

use super::level::DurabilityLevel;
use crate::wal::errors::{WalError, WalResult};

/// Resolve the effective durability for one mutation.
///
/// Returns the requested level when it is concrete, otherwise the table
/// default when that is concrete, otherwise the store-wide default.
///
/// The store-wide default being `UseDefault` is a deployment error, not a
/// per-mutation condition; callers validate it once at startup. This
/// function still refuses to return `UseDefault` rather than hand the
/// coordinator an unresolvable level.
///
/// Resolution is pure: the same inputs always produce the same output.
pub fn resolve(
    requested: DurabilityLevel,
    table_default: DurabilityLevel,
    store_default: DurabilityLevel,
) -> WalResult<DurabilityLevel> {
    if requested.is_concrete() {
        return Ok(requested);
    }
    if table_default.is_concrete() {
        return Ok(table_default);
    }
    if store_default.is_concrete() {
        return Ok(store_default);
    }
    Err(WalError::InvalidConfiguration)
}
