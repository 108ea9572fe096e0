mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
pub mod models;
mod upstream;

pub use crate::client::{ClientOptions, DEFAULT_API_URL, DEFAULT_GRAPHQL_URL, DEFAULT_TIMEOUT, GithubClient};
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockUpstream;
pub use crate::upstream::{Upstream, UpstreamHandle};
