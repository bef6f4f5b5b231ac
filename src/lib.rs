//! cirrusdb: write path of a distributed, log-structured key-value store.
//!
//! This crate is the durability half of the write path: it decides how
//! durable each mutation must be and makes sure the write-ahead log
//! actually gets there before the caller hears back.
//!
//! A mutation enters through [`write::WriteGate`], which resolves its
//! effective [`durability::DurabilityLevel`] (mutation request over table
//! default over store-wide default), encodes it, and submits it to the
//! [`wal::FlushCoordinator`]. The coordinator batches concurrent
//! submissions into flush rounds so that N writers share one flush, and
//! fires each [`wal::WriteHandle`] only once the round's strongest
//! requested guarantee holds.

pub mod durability;
pub mod wal;
pub mod write;
