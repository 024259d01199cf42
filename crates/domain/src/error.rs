//! Domain error types
//!
//! Two families live here: [`DomainError`] for invariant violations inside pure
//! domain code (rendering, state transitions, alias tables), and
//! [`ResolveError`] for everything that can go wrong while turning a single
//! placeholder into a value. Every resolution failure carries an [`ErrorKind`]
//! tag so that reports can group and filter failures.

use std::fmt;
use std::ops::Range;

use thiserror::Error;

use crate::reference::Service;

/// Domain-level errors that can occur during validation or processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An alias has conflicting mappings.
    #[error("alias '{0}' has conflicting role, account or profile mappings")]
    AmbiguousAlias(String),

    /// An alias name is empty or contains forbidden characters.
    #[error("invalid alias name: '{0}'")]
    InvalidAlias(String),

    /// A reference has no resolved value at render time.
    #[error("no resolved value for reference {0}")]
    MissingValue(String),

    /// A reference span does not match the template text it claims to cover.
    #[error("reference span {start}..{end} does not match '{raw_text}'")]
    SpanMismatch {
        /// Start offset of the span.
        start: usize,
        /// End offset of the span.
        end: usize,
        /// The raw text the reference was parsed from.
        raw_text: String,
    },

    /// Two references claim overlapping spans.
    #[error("reference spans overlap at offset {0}")]
    OverlappingSpans(usize),

    /// A run tried to move between states that are not connected.
    #[error("invalid run state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// A placeholder could not be parsed.
///
/// Parsing of the template stops at the first syntax error, so a template with
/// a malformed placeholder never produces partially substituted output.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("template syntax error at {}..{}: {message}", span.start, span.end)]
pub struct TemplateSyntaxError {
    /// What was wrong with the placeholder.
    pub message: String,
    /// Byte range of the offending placeholder in the template.
    pub span: Range<usize>,
}

impl TemplateSyntaxError {
    /// Creates a syntax error covering `span`.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Classification of resolution failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// Malformed placeholder.
    TemplateSyntax,
    /// Role alias missing from every mapping.
    AliasNotFound,
    /// Credentials could not be obtained.
    Authentication,
    /// Credentials were rejected for the requested operation.
    Authorization,
    /// No resource matched the selector.
    ResourceNotFound,
    /// More than one resource matched the selector.
    AmbiguousSelector,
    /// The attribute is not offered by the service.
    UnsupportedAttribute,
    /// The remote service asked us to slow down.
    Throttling,
    /// The remote service could not be reached or timed out.
    Unavailable,
    /// Rollback was requested without a preceding snapshot.
    NoSnapshot,
}

impl ErrorKind {
    /// Only throttling is retried.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Throttling)
    }

    /// Stable name used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TemplateSyntax => "TemplateSyntaxError",
            Self::AliasNotFound => "AliasNotFoundError",
            Self::Authentication => "AuthenticationError",
            Self::Authorization => "AuthorizationError",
            Self::ResourceNotFound => "ResourceNotFoundError",
            Self::AmbiguousSelector => "AmbiguousSelectorError",
            Self::UnsupportedAttribute => "UnsupportedAttributeError",
            Self::Throttling => "ThrottlingError",
            Self::Unavailable => "UnavailableError",
            Self::NoSnapshot => "NoSnapshotError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to resolve one reference.
///
/// `Clone` so that a single failed in-flight resolution can be handed to
/// every caller waiting on the same canonical key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The placeholder itself is malformed.
    #[error(transparent)]
    TemplateSyntax(#[from] TemplateSyntaxError),

    /// The role alias is not present in the alias table.
    #[error("unknown role alias '{alias}'")]
    AliasNotFound {
        /// The alias as written in the template.
        alias: String,
    },

    /// Obtaining credentials failed.
    #[error("authentication failed for {principal}: {cause}")]
    Authentication {
        /// Profile, role or `default` that failed to authenticate.
        principal: String,
        /// Root cause reported by the credential source.
        cause: String,
    },

    /// The credentials were valid but not allowed to do what was asked.
    #[error("not authorized as {target}: {cause}")]
    Authorization {
        /// Role ARN (or principal) that was rejected.
        target: String,
        /// Root cause reported by the remote side.
        cause: String,
    },

    /// No resource matched.
    #[error("{service} resource not found for {selector}")]
    ResourceNotFound {
        /// Service that was queried.
        service: Service,
        /// Human readable selector, e.g. `name=mydb`.
        selector: String,
    },

    /// The selector matched several resources.
    #[error("{service} selector {selector} matched {count} resources")]
    AmbiguousSelector {
        /// Service that was queried.
        service: Service,
        /// Human readable selector.
        selector: String,
        /// Number of matches.
        count: usize,
    },

    /// The service does not expose the attribute.
    #[error("{service} does not support attribute '{attribute}'")]
    UnsupportedAttribute {
        /// Service that was queried.
        service: Service,
        /// Requested attribute.
        attribute: String,
    },

    /// Rate limited by the remote side.
    #[error("throttled by {service} after {attempts} attempt(s): {cause}")]
    Throttling {
        /// Remote endpoint that throttled.
        service: String,
        /// Attempts made before giving up.
        attempts: u32,
        /// Message from the remote side.
        cause: String,
    },

    /// Timeout, connection failure or any other unexpected remote error.
    #[error("{service} unavailable: {cause}")]
    Unavailable {
        /// Remote endpoint.
        service: String,
        /// Underlying failure.
        cause: String,
    },
}

impl ResolveError {
    /// Returns the classification tag of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TemplateSyntax(_) => ErrorKind::TemplateSyntax,
            Self::AliasNotFound { .. } => ErrorKind::AliasNotFound,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Self::AmbiguousSelector { .. } => ErrorKind::AmbiguousSelector,
            Self::UnsupportedAttribute { .. } => ErrorKind::UnsupportedAttribute,
            Self::Throttling { .. } => ErrorKind::Throttling,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
        }
    }

    /// Whether a retry may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
