//! Kustforge Application - Reference resolution engine
//!
//! This crate contains the orchestration layer:
//!
//! - [`placeholder`]: parser for `{{ aws:... }}` placeholders
//! - [`session`]: per-alias session cache with role assumption
//! - [`resolvers`]: one resolver per service behind a fixed registry
//! - [`cache`]: single-flight resolution cache
//! - [`engine`]: bounded parallel resolution of a set of references
//! - [`use_cases`]: render/diff/apply and rollback
//! - [`ports`]: traits implemented by the infrastructure layer

pub mod cache;
pub mod engine;
pub mod error;
pub mod placeholder;
pub mod ports;
pub mod resolvers;
pub mod retry;
pub mod session;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStats, ResolutionCache};
pub use engine::{EngineConfig, ResolutionEngine};
pub use error::{ApplicationError, ApplicationResult};
pub use placeholder::parse_references;
pub use resolvers::{Resolver, ResolverRegistry};
pub use retry::RetryPolicy;
pub use session::SessionManager;
pub use use_cases::{ApplyMode, RenderTemplates, RollbackTemplate};
