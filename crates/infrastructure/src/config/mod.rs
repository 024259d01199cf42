//! Settings and alias configuration.
//!
//! Both are read from YAML. Settings can be overridden from the environment;
//! the alias table is immutable once loaded.

mod aliases;
mod error;
mod settings;

pub use aliases::{ROLE_ARN_PATTERN, load_alias_table, parse_alias_table};
pub use error::ConfigError;
pub use settings::{
    CONFIG_ENV, DEFAULT_CONFIG_FILE, DEFAULT_STATE_DIR, RetrySettings, RunMode, Settings,
};
