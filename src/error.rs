//! Command Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("failed to build {_0} client")]
    Client(#[error(not(source))] &'static str),
    #[display("failed to load stats for {_0}")]
    Stats(#[error(not(source))] String),
    #[display("failed to search users for {_0:?}")]
    Search(#[error(not(source))] String),
    #[display("failed to load rankings for {_0}")]
    Ranking(#[error(not(source))] String),
    #[display("{_0}")]
    Usage(#[error(not(source))] String),
    #[display("failed to write output")]
    Output,
}
