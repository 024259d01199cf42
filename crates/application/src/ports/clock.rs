//! Clock port for session expiry and cache TTLs

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Session freshness and cache expiry are computed against this port, so
/// tests can move time forward without sleeping.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}
