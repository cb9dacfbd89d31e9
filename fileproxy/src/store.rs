//! Async adapter mapping artifact keys onto a [Storage].

use crate::key::Key;
use crate::storage::Storage;
use crate::util::asyncio::ReaderStream;
use crate::util::close::Close;
use bytes::Bytes;
use std::io;
use std::io::{Read, Write};
use std::sync::Arc;
use tokio::task::{JoinError, spawn_blocking};

/// The content store of the proxy.
///
/// Wraps a blocking [Storage] and exposes key-based async operations. All storage access runs
/// on tokio's blocking thread pool. Cloning the store yields a handle to the same storage.
pub struct ContentStore<S> {
    storage: Arc<S>,
}

impl<S> Clone for ContentStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

/// An error of a [ContentStore] operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no stored content for key {0}")]
    NotFound(Key),
    #[error("storage error for key {key}: {source}")]
    Io {
        key: Key,
        #[source]
        source: io::Error,
    },
    #[error("storage task failed: {0}")]
    Task(#[from] JoinError),
}

impl<S> ContentStore<S>
where
    S: Storage + Send + Sync + 'static,
    S::Reader: Send + 'static,
{
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// The wrapped storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Checks whether content is stored under `key`.
    pub async fn exists(&self, key: &Key) -> Result<bool, StoreError> {
        self.blocking(key, |storage, path| storage.exists_file(path))
            .await
    }

    /// Reads the complete content stored under `key`.
    pub async fn read(&self, key: &Key) -> Result<Bytes, StoreError> {
        self.blocking(key, |storage, path| {
            let mut buf = Vec::new();
            storage.get(path)?.read_to_end(&mut buf)?;
            Ok(Bytes::from(buf))
        })
        .await
    }

    /// Opens the content stored under `key` for streaming.
    pub async fn open(&self, key: &Key) -> Result<ReaderStream, StoreError> {
        let reader = self
            .blocking(key, |storage, path| storage.get(path))
            .await?;
        Ok(ReaderStream::new(reader))
    }

    /// Stores `content` under `key`, replacing existing content.
    ///
    /// The content only becomes visible once it has been written completely.
    pub async fn write(&self, key: &Key, content: Bytes) -> Result<(), StoreError> {
        self.blocking(key, move |storage, path| {
            let mut writer = storage.put(path)?;
            writer.write_all(&content)?;
            writer.close()
        })
        .await
    }

    /// Deletes the content stored under `key`.
    pub async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        self.blocking(key, |storage, path| storage.delete(path))
            .await
    }

    async fn blocking<T, F>(&self, key: &Key, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&S, &str) -> io::Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let path = key.storage_path();
        spawn_blocking(move || op(&storage, &path))
            .await?
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => StoreError::NotFound(key.clone()),
                _ => StoreError::Io {
                    key: key.clone(),
                    source: err,
                },
            })
    }
}
