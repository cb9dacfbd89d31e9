//! Artifact content as handed out by the proxy.

use crate::util::asyncio::ReaderStream;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt, stream};
use std::fmt::{Debug, Formatter};
use std::io;

/// Content of an artifact, either fully buffered or streamed from storage.
pub enum Content {
    /// Content held in memory, e.g. just fetched from the origin.
    Buffered(Bytes),
    /// Content read incrementally from the content store.
    Streamed(ReaderStream),
}

impl Content {
    /// Collects the content into a single buffer.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            Self::Buffered(bytes) => Ok(bytes),
            Self::Streamed(stream) => stream
                .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                    buf.extend_from_slice(&chunk);
                    Ok(buf)
                })
                .await
                .map(BytesMut::freeze),
        }
    }

    /// Turns the content into a stream of chunks.
    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        match self {
            Self::Buffered(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
            Self::Streamed(stream) => stream.boxed(),
        }
    }
}

impl Debug for Content {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Streamed(_) => f.write_str("Streamed"),
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Self::Buffered(bytes)
    }
}
