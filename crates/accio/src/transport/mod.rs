//! The transport contract.
//!
//! The coordinator does not talk HTTP itself. It hands a resource key to a [`Fetcher`], which
//! performs a GET and returns the parsed JSON body. [`HttpFetcher`] is the production
//! implementation on top of `reqwest`.

use std::fmt;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

mod http;

pub use http::{HttpFetcher, create_client};

/// Per-request options.
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    /// Whether to send the session credentials along.
    pub with_credentials: bool,
    /// Cancelled when the request should be aborted.
    ///
    /// Implementations must resolve to [`FetchError::Cancelled`] soon after this fires.
    pub cancel: CancellationToken,
}

/// Performs GET requests for resource keys.
pub trait Fetcher: fmt::Debug + Send + Sync + 'static {
    /// Fetches `key` and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Non-2xx responses resolve to [`FetchError::Server`], unparsable bodies to
    /// [`FetchError::Decode`], and requests that never got a response to
    /// [`FetchError::Transport`].
    fn fetch_json<'a>(
        &'a self,
        key: &'a str,
        options: FetchOptions,
    ) -> BoxFuture<'a, Result<Value, FetchError>>;
}
