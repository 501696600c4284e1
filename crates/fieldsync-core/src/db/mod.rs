//! Durable local store for fieldsync

mod connection;
mod evidence_store;
mod inspection_store;
mod migrations;
mod queue;
mod service;
mod user_data;

pub use connection::Database;
pub use evidence_store::{EvidenceStore, LibSqlEvidenceStore};
pub use inspection_store::{InspectionStore, LibSqlInspectionStore};
pub use queue::{LibSqlMutationQueue, MutationQueue};
pub use service::StoreService;
pub use user_data::{LibSqlUserDataStore, UserDataStore};
