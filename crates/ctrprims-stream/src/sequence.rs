use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::demux::LogOutput;
use crate::error::StreamError;

/// A lazy, single-pass sequence of decoded items fed by a producer task.
///
/// Backed by a bounded queue: the producer stops pulling from the transport
/// while the queue is full. Dropping the sequence (or calling
/// [`ItemStream::cancel`]) aborts the producer's in-flight pull and releases
/// the underlying connection.
pub struct ItemStream<T> {
    rx: mpsc::Receiver<Result<T, StreamError>>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

/// Typed NDJSON records.
pub type RecordStream<T> = ItemStream<T>;

/// Demultiplexed (or raw) container output.
pub type OutputStream = ItemStream<LogOutput>;

impl<T> ItemStream<T> {
    /// Create the consumer end and the sender a producer task feeds.
    ///
    /// Cancelling `cancel` (which happens when the stream is dropped) should
    /// stop the producer.
    pub fn channel(
        capacity: usize,
        cancel: CancellationToken,
    ) -> (mpsc::Sender<Result<T, StreamError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stream = Self {
            rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        };
        (tx, stream)
    }

    /// Receive the next item; `None` once the sequence has ended.
    pub async fn next(&mut self) -> Option<Result<T, StreamError>> {
        self.rx.recv().await
    }

    /// Stop the producer. Items already queued can still be drained.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }

    /// Whether the sequence has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Stream for ItemStream<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> fmt::Debug for ItemStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemStream")
            .field("queued", &self.rx.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
