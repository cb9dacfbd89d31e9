//! Resolving keys to content, from the content store or the origin.

use crate::content::Content;
use crate::key::Key;
use crate::origin::{Fetch, FetchOutcome, TransportError};
use crate::storage::Storage;
use crate::store::{ContentStore, StoreError};
use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use http::StatusCode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Where resolved content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Cache,
    Origin,
}

/// Content resolved for a key.
#[derive(Debug)]
pub struct ResolvedContent {
    pub content: Content,
    /// Media type, only known for content fetched from the origin.
    pub content_type: Option<String>,
    pub source: ContentSource,
}

/// Reasons a key could not be resolved.
///
/// Cheap to clone, because a single failed fetch is reported to every request waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("{0} not found at origin")]
    NotFound(Key),
    #[error("origin responded with {status} for {key}")]
    Origin { key: Key, status: StatusCode },
    #[error("failed to fetch {key} from origin: {source}")]
    Transport {
        key: Key,
        #[source]
        source: TransportError,
    },
    #[error("content store failure: {0}")]
    Storage(#[source] Arc<StoreError>),
    #[error("failed to store {key} fetched from origin: {source}")]
    CacheWrite {
        key: Key,
        #[source]
        source: Arc<StoreError>,
    },
    #[error("fetching {0} was aborted")]
    FlightAborted(Key),
}

#[derive(Debug, Clone)]
struct Landed {
    content: Bytes,
    content_type: Option<String>,
    source: ContentSource,
}

type Flight = Shared<BoxFuture<'static, Result<Landed, ResolveError>>>;
type InFlight = Arc<Mutex<HashMap<Key, Flight>>>;

/// Serves content from the [ContentStore] and fills it from the origin on a miss.
///
/// Concurrent misses for the same key share a single fetch: the first miss starts a flight, all
/// further requests for the key wait for its result until it has landed. The flight runs as a
/// task of its own, so it completes and fills the store even if every waiting request is
/// cancelled. Failed fetches are not cached; the next request for the key fetches again.
pub struct CacheCoordinator<S, F> {
    store: ContentStore<S>,
    fetcher: Arc<F>,
    in_flight: InFlight,
}

impl<S, F> CacheCoordinator<S, F>
where
    S: Storage + Send + Sync + 'static,
    S::Reader: Send + 'static,
    F: Fetch + 'static,
{
    pub fn new(store: ContentStore<S>, fetcher: F) -> Self {
        Self {
            store,
            fetcher: Arc::new(fetcher),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &ContentStore<S> {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Number of keys currently being fetched from the origin.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Resolves `key` to its content.
    ///
    /// Stored content is streamed from the store. On a miss the content is fetched from the
    /// origin, stored, and returned in full.
    pub async fn resolve(&self, key: &Key) -> Result<ResolvedContent, ResolveError> {
        match self.store.open(key).await {
            Ok(stream) => {
                debug!(%key, "cache hit");
                return Ok(ResolvedContent {
                    content: Content::Streamed(stream),
                    content_type: None,
                    source: ContentSource::Cache,
                });
            }
            Err(StoreError::NotFound(_)) => debug!(%key, "cache miss"),
            Err(err) => return Err(ResolveError::Storage(Arc::new(err))),
        }

        let landed = self.join_flight(key).await?;
        Ok(ResolvedContent {
            content: Content::Buffered(landed.content),
            content_type: landed.content_type,
            source: landed.source,
        })
    }

    fn join_flight(&self, key: &Key) -> Flight {
        let mut in_flight = self.in_flight.lock();
        if let Some(flight) = in_flight.get(key) {
            debug!(%key, "joining fetch in flight");
            return flight.clone();
        }

        let guard = FlightGuard {
            key: key.clone(),
            in_flight: Arc::clone(&self.in_flight),
        };
        let task = tokio::spawn(fly(
            self.store.clone(),
            Arc::clone(&self.fetcher),
            key.clone(),
            guard,
        ));
        let aborted_key = key.clone();
        let flight = async move {
            task.await.unwrap_or_else(|err| {
                error!(key = %aborted_key, error = %err, "fetch task failed");
                Err(ResolveError::FlightAborted(aborted_key))
            })
        }
        .boxed()
        .shared();
        in_flight.insert(key.clone(), flight.clone());
        flight
    }
}

async fn fly<S, F>(
    store: ContentStore<S>,
    fetcher: Arc<F>,
    key: Key,
    _guard: FlightGuard,
) -> Result<Landed, ResolveError>
where
    S: Storage + Send + Sync + 'static,
    S::Reader: Send + 'static,
    F: Fetch + 'static,
{
    // A previous flight may have landed between the miss and the start of this one.
    match store.read(&key).await {
        Ok(content) => {
            return Ok(Landed {
                content,
                content_type: None,
                source: ContentSource::Cache,
            });
        }
        Err(StoreError::NotFound(_)) => {}
        Err(err) => return Err(ResolveError::Storage(Arc::new(err))),
    }

    match fetcher.fetch(&key).await {
        FetchOutcome::Success(fetched) => {
            if let Err(err) = store.write(&key, fetched.content.clone()).await {
                error!(%key, error = %err, "failed to store content fetched from origin");
                return Err(ResolveError::CacheWrite {
                    key,
                    source: Arc::new(err),
                });
            }
            info!(%key, size = fetched.content.len(), "stored content fetched from origin");
            Ok(Landed {
                content: fetched.content,
                content_type: fetched.content_type,
                source: ContentSource::Origin,
            })
        }
        FetchOutcome::NotFound => Err(ResolveError::NotFound(key)),
        FetchOutcome::OriginError(status) => Err(ResolveError::Origin { key, status }),
        FetchOutcome::TransportFailure(source) => Err(ResolveError::Transport { key, source }),
    }
}

/// Removes the in-flight marker of a key once its flight has landed, crashed, or was dropped.
struct FlightGuard {
    key: Key,
    in_flight: InFlight,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}
