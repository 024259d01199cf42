//! Credential and session management

mod manager;

pub use manager::{DEFAULT_REFRESH_SKEW_SECS, DEFAULT_SESSION_LIFETIME_SECS, SessionManager};
