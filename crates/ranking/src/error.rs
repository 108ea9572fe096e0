//! Ranking Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The leaderboard source has no file for this country.
    #[display("country not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Network failure, timeout or unexpected status. A stale copy, if any,
    /// is served instead.
    #[display("leaderboard temporarily unavailable: {_0}")]
    Transient(#[error(not(source))] String),
    #[display("malformed leaderboard payload: {_0}")]
    Invalid(#[error(not(source))] String),
    #[display("failed to build HTTP client")]
    Client,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
