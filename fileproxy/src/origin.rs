//! Fetching artifacts from the origin server.
//!
//! The [Fetch] trait is the seam between the cache coordinator and the origin. [http] provides
//! the implementation talking to an HTTP origin, [auth] the ways of authenticating against it.

pub mod auth;
pub mod http;

use crate::key::Key;
use ::http::StatusCode;
use async_trait::async_trait;
use bytes::Bytes;
use std::error::Error;
use std::sync::Arc;

/// Artifact content successfully fetched from the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub content: Bytes,
    /// Media type reported by the origin, if any.
    pub content_type: Option<String>,
}

/// Result of a single fetch attempt.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The origin delivered the artifact.
    Success(Fetched),
    /// The origin does not know the artifact.
    NotFound,
    /// The origin was reachable, but rejected the request or failed.
    OriginError(StatusCode),
    /// The origin could not be reached or the response could not be received completely.
    TransportFailure(TransportError),
}

/// Cause of a [FetchOutcome::TransportFailure].
///
/// Cheap to clone, so that one failure can be handed to every request waiting on the fetch.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(Arc<dyn Error + Send + Sync>);

impl TransportError {
    pub fn new(err: impl Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }

    /// Creates a transport error from a plain message.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self(Arc::from(Box::<dyn Error + Send + Sync>::from(msg.into())))
    }
}

/// Fetches artifacts by key from an origin.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Performs a single fetch attempt for `key`. Implementations must not retry.
    async fn fetch(&self, key: &Key) -> FetchOutcome;
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    async fn fetch(&self, key: &Key) -> FetchOutcome {
        (**self).fetch(key).await
    }
}
