//! Placeholder scanning
//!
//! Turns template text into [`kustforge_domain::Reference`] values with exact
//! byte spans, so that rendering can substitute without touching anything else.

mod parser;

pub use parser::{is_valid_identifier, parse_references};
