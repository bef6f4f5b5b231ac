//! Durability contract for the write path.
//!
//! Every mutation carries a requested [`DurabilityLevel`], which may defer
//! to its table's default, which may defer to the store-wide default.
//! [`resolve`] collapses that three-tier precedence into the single
//! effective level the flush coordinator enforces.

mod level;
mod resolver;
mod table;

pub use level::DurabilityLevel;
pub use resolver::resolve;
pub use table::{StaticTableDefaults, TableDefaults, TableDurabilityConfig};
