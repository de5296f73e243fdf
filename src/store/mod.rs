//! Persistence layer: durable key-value storage and onboarding snapshots.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod snapshots;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryStore;
pub use snapshots::{SnapshotKey, SnapshotStatus, SnapshotStore};
pub use traits::KeyValueStore;
