//! Kustforge Domain - Core types for reference resolution
//!
//! This crate defines the domain model of the reference resolution engine:
//! parsed placeholders, alias tables, sessions, snapshots, and the pure
//! render and diff functions. All types here are pure Rust with no I/O.

pub mod alias;
pub mod cache;
pub mod diff;
pub mod error;
pub mod outcome;
pub mod reference;
pub mod render;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod template;

pub use alias::{AliasTable, AliasTarget};
pub use cache::CacheEntry;
pub use diff::{LineChange, TextDiff, diff, diff_text};
pub use error::{DomainError, DomainResult, ErrorKind, ResolveError, TemplateSyntaxError};
pub use outcome::{ReferenceFailure, RenderedOutput, RunOutcome, TemplateDiff};
pub use reference::{CanonicalKey, Reference, Service};
pub use render::render;
pub use session::{Credentials, Identity, Session, SessionKey};
pub use snapshot::Snapshot;
pub use state::RunState;
pub use template::{Template, TemplateId};
