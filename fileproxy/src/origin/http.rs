//! Fetching artifacts from an HTTP origin.

use super::auth::{Authenticator, OutboundRequest};
use super::{Fetch, FetchOutcome, Fetched, TransportError};
use crate::key::Key;
use ::http::StatusCode;
use ::http::header::CONTENT_TYPE;
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default time limit for a single fetch, including reading the response body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetches artifacts from an HTTP origin.
///
/// The URL of an artifact is the base URL with the key's segments appended, e.g. the key
/// `["foo", "bar"]` maps to `https://origin/files/foo/bar` for the base URL
/// `https://origin/files/`.
pub struct HttpOrigin {
    base_url: Url,
    client: Client,
    authenticator: Box<dyn Authenticator>,
}

/// An error while setting up an [HttpOrigin].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum OriginSetupError {
    #[error("origin URL {0} cannot be used as a base URL")]
    InvalidBaseUrl(Url),
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl HttpOrigin {
    /// Creates an origin with the given base URL, time limit per fetch, and credentials.
    pub fn new(
        base_url: Url,
        timeout: Duration,
        authenticator: impl Authenticator + 'static,
    ) -> Result<Self, OriginSetupError> {
        if base_url.cannot_be_a_base() {
            return Err(OriginSetupError::InvalidBaseUrl(base_url));
        }
        let client = Client::builder()
            .user_agent(concat!("fileproxy/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url,
            client,
            authenticator: Box::new(authenticator),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL the artifact with the given key is fetched from.
    pub fn url_for(&self, key: &Key) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(key.segments());
        }
        url
    }
}

impl Debug for HttpOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOrigin")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Fetch for HttpOrigin {
    async fn fetch(&self, key: &Key) -> FetchOutcome {
        let request = self
            .authenticator
            .decorate(OutboundRequest::get(self.url_for(key)));
        debug!(url = %request.url, "fetching from origin");
        let response = match self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(%key, error = %err, "origin unreachable");
                return FetchOutcome::TransportFailure(TransportError::new(err));
            }
        };

        let status = response.status();
        if status.is_success() {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            return match response.bytes().await {
                Ok(content) => FetchOutcome::Success(Fetched {
                    content,
                    content_type,
                }),
                Err(err) => {
                    warn!(%key, error = %err, "failed to receive response body from origin");
                    FetchOutcome::TransportFailure(TransportError::new(err))
                }
            };
        }

        if status == StatusCode::NOT_FOUND {
            debug!(%key, "not found at origin");
            FetchOutcome::NotFound
        } else {
            warn!(%key, status = status.as_u16(), "origin responded with error");
            FetchOutcome::OriginError(status)
        }
    }
}
