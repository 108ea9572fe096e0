//! Upstream Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An upstream error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upstream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested user, repository or resource does not exist. Definitive;
    /// do not retry.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The upstream quota is exhausted. Callers should prompt for
    /// authenticated access rather than retrying immediately.
    #[display("upstream rate limit exceeded")]
    RateLimited,
    /// Credentials were rejected or lack the required scope.
    #[display("access forbidden: {_0}")]
    Forbidden(#[error(not(source))] String),
    /// Network failure, timeout or 5xx response.
    #[display("transient upstream failure: {_0}")]
    Transient(#[error(not(source))] String),
    /// The upstream answered, but with something we could not understand.
    #[display("invalid upstream payload: {_0}")]
    Invalid(#[error(not(source))] String),
    /// The HTTP client itself could not be constructed.
    #[display("failed to build HTTP client")]
    Client,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
