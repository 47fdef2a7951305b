//! Pipe construction and operators.
//!
//! A [`Pipe`] wraps the reading end of a stream. Each operator consumes the
//! pipe, spawns one worker reading from it, and returns a pipe over the
//! worker's output, so `filter(..).transform(..)` wires two independently
//! scheduled stages joined by an intermediate stream. Building a pipe never
//! waits; only reading from it does.

pub mod handle;

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{channel, Receiver, Sender};
use crate::error::Result;
use crate::stage::{self, StageKind};

pub use handle::PipeHandle;

/// Configuration for the streams a pipe creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipeConfig {
    /// Items buffered in each stream created by `filter` and `transform`
    pub buffer_size: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self { buffer_size: 1 }
    }
}

/// A composable stage over a single readable stream.
#[derive(Debug)]
pub struct Pipe<T> {
    source: Receiver<T>,
    config: PipeConfig,
    workers: PipeHandle,
    token: CancellationToken,
}

impl<T> Pipe<T> {
    /// Wrap a readable stream. Any stream is accepted, including a closed one.
    pub fn new(source: Receiver<T>) -> Self {
        Self::with_cancellation(source, CancellationToken::new())
    }

    /// Wrap a readable stream whose workers stop when `token` is cancelled.
    pub fn with_cancellation(source: Receiver<T>, token: CancellationToken) -> Self {
        Self {
            source,
            config: PipeConfig::default(),
            workers: PipeHandle::new(token.clone()),
            token,
        }
    }

    /// Set the buffer size of streams created by later operators
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn with_config(mut self, config: PipeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop every worker built on this pipe so far, and every later one.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The underlying readable stream.
    ///
    /// Workers behind it are detached; use [`Pipe::into_parts`] to keep
    /// their handle.
    pub fn receive(self) -> Receiver<T> {
        self.source
    }

    /// The readable stream together with the handle of every upstream worker.
    pub fn into_parts(self) -> (Receiver<T>, PipeHandle) {
        (self.source, self.workers)
    }

    fn then<U, F>(self, stage: StageKind, spawn: F) -> Pipe<U>
    where
        F: FnOnce(Receiver<T>, Sender<U>, CancellationToken) -> JoinHandle<Result<()>>,
    {
        let Pipe {
            source,
            config,
            mut workers,
            token,
        } = self;
        let (output, next) = channel(config.buffer_size);
        workers.push(stage, spawn(source, output, token.clone()));

        Pipe {
            source: next,
            config,
            workers,
            token,
        }
    }
}

impl<T: Send + 'static> Pipe<T> {
    /// Feed any `Stream` into a new pipe through one worker.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self::from_stream_with_cancellation(stream, CancellationToken::new())
    }

    pub fn from_stream_with_cancellation<S>(stream: S, token: CancellationToken) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let config = PipeConfig::default();
        let (output, source) = channel(config.buffer_size);
        let mut workers = PipeHandle::new(token.clone());
        workers.push(
            StageKind::Feed,
            stage::spawn(
                StageKind::Feed,
                stage::run_feed(stream, output, token.clone()),
            ),
        );

        Self {
            source,
            config,
            workers,
            token,
        }
    }

    /// Keep only the items for which `predicate` returns true, in order.
    pub fn filter<F>(self, predicate: F) -> Pipe<T>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.then(StageKind::Filter, |source, output, token| {
            stage::spawn(
                StageKind::Filter,
                stage::run_filter(source, output, predicate, token),
            )
        })
    }

    /// Apply `mapper` to every item, one to one, in order.
    pub fn transform<U, F>(self, mapper: F) -> Pipe<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        self.then(StageKind::Transform, |source, output, token| {
            stage::spawn(
                StageKind::Transform,
                stage::run_transform(source, output, mapper, token),
            )
        })
    }

    /// Broadcast every item to all `destinations` and close them all when
    /// this pipe's stream closes.
    ///
    /// Item `n` reaches every destination before item `n + 1` reaches any,
    /// so the slowest destination throttles the rest. The returned handle
    /// may be dropped.
    pub fn to<I>(self, destinations: I) -> PipeHandle
    where
        T: Clone,
        I: IntoIterator<Item = Sender<T>>,
    {
        let Pipe {
            source,
            mut workers,
            token,
            ..
        } = self;
        let destinations: Vec<Sender<T>> = destinations.into_iter().collect();
        stage_debug!(destinations = destinations.len(), "broadcasting pipe");

        workers.push(
            StageKind::Broadcast,
            stage::spawn(
                StageKind::Broadcast,
                stage::run_broadcast(source, destinations, token),
            ),
        );
        workers
    }
}

impl<T> From<Receiver<T>> for Pipe<T> {
    fn from(source: Receiver<T>) -> Self {
        Pipe::new(source)
    }
}

impl<T> From<mpsc::Receiver<T>> for Pipe<T> {
    fn from(source: mpsc::Receiver<T>) -> Self {
        Pipe::new(source.into())
    }
}
