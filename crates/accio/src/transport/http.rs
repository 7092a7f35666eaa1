//! Support to fetch resources from the ScoreSaber HTTP API.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, header};
use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::error::FetchError;

use super::{FetchOptions, Fetcher};

/// The user agent sent along with every request.
pub const USER_AGENT: &str = concat!("accio/", env!("CARGO_PKG_VERSION"));

/// Creates a `reqwest` client with the configured timeouts.
pub fn create_client(config: &Config) -> reqwest::Result<Client> {
    reqwest::ClientBuilder::new()
        .gzip(true)
        .user_agent(USER_AGENT)
        .connect_timeout(config.connect_timeout)
        .timeout(config.timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
}

/// [`Fetcher`] implementation for the HTTP API.
///
/// Keys starting with `/` are appended to `api_url`, absolute URLs are requested as they are.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    api_url: Option<Url>,
    session_cookie: Option<String>,
}

impl HttpFetcher {
    pub fn new(client: Client, api_url: Option<Url>) -> Self {
        Self {
            client,
            api_url,
            session_cookie: None,
        }
    }

    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let client = create_client(config)?;
        let fetcher = Self::new(client, config.api_url.clone());
        Ok(fetcher.with_session(config.session_cookie.clone()))
    }

    /// Sets the cookie that is sent with credentialed requests.
    pub fn with_session(mut self, session_cookie: Option<String>) -> Self {
        self.session_cookie = session_cookie;
        self
    }

    /// Resolves a resource key to the URL to request.
    pub fn resolve(&self, key: &str) -> Result<Url, FetchError> {
        if key.starts_with('/') {
            let Some(api_url) = &self.api_url else {
                return Err(FetchError::Transport(format!(
                    "cannot resolve `{key}` without an API URL"
                )));
            };
            // concatenate instead of `Url::join`, which would drop a path prefix of the API URL
            let base = api_url.as_str().trim_end_matches('/');
            return Url::parse(&format!("{base}{key}"))
                .map_err(|e| FetchError::Transport(format!("invalid URL for `{key}`: {e}")));
        }
        Url::parse(key)
            .map_err(|e| FetchError::Transport(format!("invalid URL `{key}`: {e}")))
    }

    async fn fetch(&self, key: &str, options: FetchOptions) -> Result<Value, FetchError> {
        let url = self.resolve(key)?;
        tracing::debug!("Fetching `{}`", url);

        let mut builder = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json");
        if options.with_credentials {
            if let Some(cookie) = &self.session_cookie {
                builder = builder.header(header::COOKIE, cookie);
            }
        }

        let response = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => return Err(FetchError::Cancelled),
            response = builder.send() => response?,
        };
        let status = response.status();
        let body = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => return Err(FetchError::Cancelled),
            body = response.bytes() => body?,
        };

        if !status.is_success() {
            let err = FetchError::from_response(status, &body);
            tracing::debug!(error = &err as &dyn std::error::Error, "Request failed");
            return Err(err);
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_json<'a>(
        &'a self,
        key: &'a str,
        options: FetchOptions,
    ) -> BoxFuture<'a, Result<Value, FetchError>> {
        Box::pin(self.fetch(key, options))
    }
}
