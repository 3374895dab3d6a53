//! HTTP GET of the resolved confirmation target.
//!
//! Fetches never fail with an [`Error`](crate::Error): network and protocol problems are
//! reported in the returned [`FetchOutcome`] so a bad link cannot stop the poll loop.

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use tracing::{info, instrument, warn};

const MAX_REDIRECTS: usize = 10;

/// What happened when a confirmation URL was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// `true` when any HTTP response was received, whatever its status.
    pub success: bool,
    /// Final status code after redirects, if a response arrived.
    pub status: Option<u16>,
    /// Final URL after redirects, or the error text.
    pub detail: String,
}

impl FetchOutcome {
    /// A response was received.
    #[must_use]
    pub fn completed(status: u16, final_url: impl Into<String>) -> Self {
        Self {
            success: true,
            status: Some(status),
            detail: final_url.into(),
        }
    }

    /// No response was received.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            detail: error.into(),
        }
    }
}

impl std::fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "status={status},final={}", self.detail),
            None => write!(f, "status=none,final={}", self.detail),
        }
    }
}

/// Issues the confirmation request.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Requests `url`, following redirects.
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds the client with the configured user agent and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HttpClient`] if the TLS backend cannot be initialized.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|source| Error::HttpClient { source })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(name = "fetcher::get", skip(self))]
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Confirmation request failed");
                return FetchOutcome::failed(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        // Read the body so the server sees a completed request.
        if let Err(e) = response.bytes().await {
            warn!(error = %e, "Confirmation response body not read");
        }

        info!(status, final_url = %final_url, "Confirmation request completed");

        FetchOutcome::completed(status, final_url)
    }
}
