//! Mutation ingress for the write path.

mod gate;
mod mutation;

pub use gate::{StoreOptions, WriteGate};
pub use mutation::{BatchOp, Mutation, MutationOp};
