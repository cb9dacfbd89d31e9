//! Bridges blocking [Read] implementations into async streams.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::io;
use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;

const CHUNK_SIZE: usize = 256 * 1024;
const CHANNEL_CAPACITY: usize = 8;

/// A stream of byte chunks read from a blocking reader on tokio's blocking thread pool.
///
/// Reading stops at EOF, after the first error, or when the stream is dropped.
pub struct ReaderStream {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl ReaderStream {
    /// Starts reading from `reader`. Must be called from within a tokio runtime.
    pub fn new<R: Read + Send + 'static>(mut reader: R) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        spawn_blocking(move || {
            let mut buf = BytesMut::zeroed(CHUNK_SIZE);
            loop {
                let chunk = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => Ok(buf.split_to(n).freeze()),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => Err(err),
                };
                let failed = chunk.is_err();
                if tx.blocking_send(chunk).is_err() || failed {
                    break;
                }
                if buf.len() < CHUNK_SIZE / 4 {
                    buf = BytesMut::zeroed(CHUNK_SIZE);
                }
            }
        });
        Self { rx }
    }
}

impl Stream for ReaderStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
