//! Service Error Types
//!
//! Upstream failures keep their original kind so callers can still tell a
//! missing user apart from an exhausted rate limit.

use derive_more::{Display, Error};
use ghstats_github::error::{Error as UpstreamError, ErrorKind as UpstreamErrorKind};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("upstream failure: {_0}")]
    Upstream(#[error(not(source))] UpstreamErrorKind),
    /// Derived stats need a fresh aggregate; fetch the user's stats first.
    #[display("no cached stats for {_0}")]
    NotCached(#[error(not(source))] String),
    #[display("repository not found: {_0}")]
    RepositoryNotFound(#[error(not(source))] String),
}

impl ErrorKind {
    /// Wraps an upstream error, keeping its kind and its frame as a child in
    /// this error tree.
    #[track_caller]
    pub fn upstream(err: UpstreamError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Upstream(inner))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream(kind) => kind.is_retryable(),
            Self::NotCached(_) | Self::RepositoryNotFound(_) => false,
        }
    }
}
