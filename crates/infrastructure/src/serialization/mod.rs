//! Serialization helpers.
//!
//! Snapshot history is written as deterministic JSON so that state files
//! produce clean diffs under version control:
//! - keys in declaration or `BTreeMap` order
//! - 2-space indentation
//! - trailing newline
//!
//! Settings, alias tables and inventories are read from YAML.

mod json;
mod yaml;

pub use json::{SerializationError, from_json_bytes, to_json_stable, to_json_stable_bytes};
pub use yaml::from_yaml;
