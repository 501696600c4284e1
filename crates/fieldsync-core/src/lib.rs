//! fieldsync-core - Core library for fieldsync
//!
//! This crate contains the offline-first client runtime shared by all
//! fieldsync interfaces: the durable local store, the pending-mutation
//! queue, the sync engine, the network monitor, and the cache worker.

pub mod db;
pub mod error;
pub mod models;
pub mod net;
pub mod sync;
pub mod worker;

pub use error::{Error, Result};
pub use models::{Evidence, Inspection, PendingMutation, SyncStatus};
