use bytes::Bytes;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;

#[derive(Debug, Error)]
pub enum StreamProtocolError {
  #[error("chunk fed after end-of-stream was signaled")]
  FeedAfterEof,
  #[error("end-of-stream signaled twice")]
  DoubleEof,
  #[error("consumer side of the stream is gone")]
  ConsumerClosed,
}

struct Shared {
  finished: AtomicBool,
}

/// Create a bounded single-producer/single-consumer byte-chunk conduit.
///
/// The sink feeds chunks in arrival order; the stream yields them in the
/// same order. `capacity` bounds how many chunks may be in flight, which is
/// what gives the producer back-pressure against a slow consumer.
pub fn chunk_channel(capacity: usize) -> (ChunkSink, ChunkStream) {
  let (tx, rx) = mpsc::channel(capacity);
  let shared = Arc::new(Shared {
    finished: AtomicBool::new(false),
  });
  (
    ChunkSink {
      tx: Some(tx),
      shared: shared.clone(),
    },
    ChunkStream {
      rx,
      shared,
      done: false,
    },
  )
}

/// Producer half of the conduit.
///
/// Dropping the sink without calling [`ChunkSink::feed_eof`] marks the
/// stream aborted: the consumer observes an error instead of a clean end, so
/// a provider reading from a half-fed upload fails instead of hanging.
pub struct ChunkSink {
  tx: Option<mpsc::Sender<Bytes>>,
  shared: Arc<Shared>,
}

impl ChunkSink {
  /// Push one chunk. Suspends when the channel is full.
  pub async fn feed(&mut self, chunk: Bytes) -> Result<(), StreamProtocolError> {
    let tx = self.tx.as_ref().ok_or(StreamProtocolError::FeedAfterEof)?;
    tx.send(chunk)
      .await
      .map_err(|_| StreamProtocolError::ConsumerClosed)
  }

  /// Signal end-of-stream. Must be called exactly once; buffered chunks are
  /// still delivered before the consumer sees the end.
  pub fn feed_eof(&mut self) -> Result<(), StreamProtocolError> {
    if self.tx.is_none() {
      return Err(StreamProtocolError::DoubleEof);
    }
    // Publish the flag before closing the channel so the consumer cannot
    // observe a closed channel with a stale flag.
    self.shared.finished.store(true, Ordering::Release);
    self.tx = None;
    Ok(())
  }

  /// Abort the stream without signaling end-of-stream.
  pub fn abort(mut self) {
    self.tx = None;
  }
}

/// Consumer half of the conduit, a `Stream` of `io::Result<Bytes>`.
pub struct ChunkStream {
  rx: mpsc::Receiver<Bytes>,
  shared: Arc<Shared>,
  done: bool,
}

impl ChunkStream {
  /// Adapt to `AsyncRead` for consumers that copy bytes instead of chunks.
  pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin + 'static {
    StreamReader::new(self)
  }
}

impl futures_util::Stream for ChunkStream {
  type Item = io::Result<Bytes>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    if this.done {
      return Poll::Ready(None);
    }
    match this.rx.poll_recv(cx) {
      Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
      Poll::Ready(None) => {
        this.done = true;
        if this.shared.finished.load(Ordering::Acquire) {
          Poll::Ready(None)
        } else {
          Poll::Ready(Some(Err(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "stream aborted before end-of-stream",
          ))))
        }
      },
      Poll::Pending => Poll::Pending,
    }
  }
}
