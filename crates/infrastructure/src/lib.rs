//! Kustforge Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports defined in the
//! application layer, plus configuration loading and template discovery.

pub mod adapters;
pub mod config;
pub mod inventory;
pub mod persistence;
pub mod serialization;
pub mod templates;

pub use adapters::SystemClock;
pub use config::{ConfigError, RetrySettings, RunMode, Settings, load_alias_table};
pub use inventory::{Inventory, InventoryClient, InventoryCredentialProvider};
pub use persistence::{FileSnapshotStore, TokioFileSystem};
pub use serialization::{SerializationError, from_json_bytes, to_json_stable, to_json_stable_bytes};
pub use templates::{TemplateError, discover_templates, load_templates};
