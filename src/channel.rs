//! Typed stream endpoints.
//!
//! A stream has exactly one [`Sender`]. The sender is not `Clone` and closing
//! it consumes it, so a stream can only ever be closed once.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};

/// Create a bounded stream.
///
/// A capacity of zero is promoted to one: the writer then blocks until the
/// reader has taken the previous item. Capacities above what Tokio can track
/// are lowered to `Semaphore::MAX_PERMITS`.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.clamp(1, Semaphore::MAX_PERMITS));
    (Sender { inner: tx }, Receiver { inner: rx })
}

/// Create a stream that already holds `items` and is closed.
pub fn from_iter<T, I>(items: I) -> Receiver<T>
where
    I: IntoIterator<Item = T>,
{
    let items: Vec<T> = items.into_iter().collect();
    let (tx, rx) = mpsc::channel(items.len().max(1));
    for item in items {
        // Capacity matches the item count, so this never fails.
        let _ = tx.try_send(item);
    }
    Receiver { inner: rx }
}

/// The single writing end of a stream.
#[derive(Debug)]
pub struct Sender<T> {
    inner: mpsc::Sender<T>,
}

impl<T> Sender<T> {
    /// Write an item, waiting while the buffer is full.
    pub async fn send(&self, item: T) -> Result<()> {
        self.inner.send(item).await.map_err(Error::from)
    }

    /// Whether the reading end has gone away.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Close the stream. Readers drain what is buffered, then see the end.
    pub fn close(self) {
        drop(self);
    }
}

impl<T> From<mpsc::Sender<T>> for Sender<T> {
    fn from(inner: mpsc::Sender<T>) -> Self {
        Self { inner }
    }
}

/// The reading end of a stream.
#[derive(Debug)]
pub struct Receiver<T> {
    inner: mpsc::Receiver<T>,
}

impl<T> Receiver<T> {
    /// Receive the next item, or `None` once the stream is closed and empty.
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.recv().await
    }

    /// Receive without waiting. `Ok(None)` means closed and drained.
    pub fn try_recv(&mut self) -> std::result::Result<Option<T>, Empty> {
        match self.inner.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Disconnected) => Ok(None),
            Err(TryRecvError::Empty) => Err(Empty),
        }
    }

    /// Whether the writer has closed the stream. Buffered items may remain.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Read every remaining item until the stream closes.
    pub async fn collect_all(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.inner.recv().await {
            items.push(item);
        }
        items
    }

    pub fn into_inner(self) -> mpsc::Receiver<T> {
        self.inner
    }
}

impl<T> From<mpsc::Receiver<T>> for Receiver<T> {
    fn from(inner: mpsc::Receiver<T>) -> Self {
        Self { inner }
    }
}

impl<T> Stream for Receiver<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.inner.poll_recv(cx)
    }
}

/// Returned by [`Receiver::try_recv`] when nothing is buffered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stream is empty but still open")]
pub struct Empty;
