//! File-backed persistence.

mod file_system;
mod snapshot_store;

pub use file_system::TokioFileSystem;
pub use snapshot_store::FileSnapshotStore;
