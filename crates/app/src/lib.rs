//! Kustforge - render Kubernetes templates with live AWS resource values
//!
//! The binary is a thin shell over [`Runner`]: it parses arguments, loads
//! settings, runs one action and prints the [`RunReport`].

pub mod cli;
pub mod report;
pub mod runner;

pub use cli::{Cli, Command};
pub use report::write_report;
pub use runner::{LookupStats, RunReport, Runner};
