//! In-memory storage backend for the Hemolink service.
//!
//! Record tables use lock-free `papaya` maps; the per-sync-type status
//! rows and the audit trail sit behind async locks because their updates
//! are read-modify-write. Suitable for tests and single-node deployments;
//! the production database is an external collaborator behind the same
//! traits.

mod storage;

pub use storage::InMemoryStore;
