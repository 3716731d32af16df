//! Chunked response bodies over stored content.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures::Stream;
use tempfile::TempPath;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use crate::error::is_disconnect;

/// A response body that reads its source in bounded chunks.
///
/// The source is released when the stream is dropped, whether it finished,
/// failed or the client went away. An optional temporary file is removed at
/// the same moment.
pub struct DeliveryStream<R> {
    inner: ReaderStream<R>,
    label: String,
    expected: u64,
    sent: u64,
    finished: bool,
    temp: Option<TempPath>,
}

impl<R: AsyncRead + Unpin> DeliveryStream<R> {
    /// Stream `reader`, which is expected to yield `expected` bytes.
    pub fn new(reader: R, chunk_size: usize, expected: u64, label: impl Into<String>) -> Self {
        Self {
            inner: ReaderStream::with_capacity(reader, chunk_size.max(1)),
            label: label.into(),
            expected,
            sent: 0,
            finished: false,
            temp: None,
        }
    }

    /// Remove `path` once the stream is dropped.
    pub fn with_temp_file(mut self, path: TempPath) -> Self {
        self.temp = Some(path);
        self
    }

    /// Bytes handed to the transport so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl<R: AsyncRead + Unpin> Stream for DeliveryStream<R> {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                if is_disconnect(&e) {
                    info!(target = %this.label, sent = this.sent, "client disconnected");
                    Poll::Ready(None)
                } else {
                    error!(target = %this.label, sent = this.sent, error = %e, "read failed while streaming");
                    Poll::Ready(Some(Err(e)))
                }
            }
            Poll::Ready(None) => {
                this.finished = true;
                debug!(target = %this.label, sent = this.sent, "stream complete");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> Drop for DeliveryStream<R> {
    fn drop(&mut self) {
        if !self.finished {
            info!(
                target = %self.label,
                sent = self.sent,
                expected = self.expected,
                "client disconnected"
            );
        }
    }
}
