//! Stage workers.
//!
//! Every operator on a [`Pipe`](crate::Pipe) spawns exactly one worker task.
//! A worker reads its upstream until it closes, applies its operator to one
//! item at a time, and closes its outputs when it returns. The only points
//! where a worker waits are the upstream read and the downstream write, and
//! both also watch the cancellation token.

use std::fmt;
use std::future::Future;

use futures_core::Stream;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::channel::{Receiver, Sender};
use crate::error::{Error, Result};
use crate::metrics;

/// The operator a worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Filter,
    Transform,
    Broadcast,
    /// Copies an arbitrary `Stream` into a pipe
    Feed,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Filter => "filter",
            StageKind::Transform => "transform",
            StageKind::Broadcast => "broadcast",
            StageKind::Feed => "feed",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a worker. There is no way back to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkerState {
    /// Consuming upstream
    Running,
    /// Upstream closed (or every reader left); no more reads
    Draining,
    /// Outputs closed; the task is about to return
    Closed,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Running => write!(f, "running"),
            WorkerState::Draining => write!(f, "draining"),
            WorkerState::Closed => write!(f, "closed"),
        }
    }
}

/// Bookkeeping shared by all stage loops.
pub(crate) struct Worker {
    stage: StageKind,
    token: CancellationToken,
    state: WorkerState,
    received: u64,
    sent: u64,
}

impl Worker {
    pub(crate) fn new(stage: StageKind, token: CancellationToken) -> Self {
        Self {
            stage,
            token,
            state: WorkerState::Running,
            received: 0,
            sent: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, next: WorkerState) {
        if next <= self.state {
            return;
        }
        stage_debug!(
            stage = %self.stage,
            from = %self.state,
            to = %next,
            received = self.received,
            sent = self.sent,
            "stage worker state changed"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = (self.received, self.sent);
        self.state = next;
        if next == WorkerState::Closed {
            metrics::record_closed(self.stage);
        }
    }

    fn cancelled(&mut self) -> Error {
        stage_debug!(stage = %self.stage, received = self.received, "stage worker cancelled");
        self.transition(WorkerState::Closed);
        Error::Cancelled { stage: self.stage }
    }

    /// Read the next upstream item. `Ok(None)` once upstream has closed.
    pub(crate) async fn next<S>(&mut self, source: &mut S) -> Result<Option<S::Item>>
    where
        S: Stream + Unpin,
    {
        let next = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            item = source.next() => Some(item),
        };

        match next {
            None => Err(self.cancelled()),
            Some(Some(item)) => {
                self.received += 1;
                metrics::record_in(self.stage);
                stage_trace!(stage = %self.stage, received = self.received, "item received");
                Ok(Some(item))
            }
            Some(None) => {
                self.transition(WorkerState::Draining);
                Ok(None)
            }
        }
    }

    /// Write one item downstream, waiting for buffer space.
    ///
    /// Returns `Ok(false)` when the reader of `output` is gone.
    pub(crate) async fn forward<T>(&mut self, output: &Sender<T>, item: T) -> Result<bool> {
        let sent = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            sent = output.send(item) => Some(sent),
        };

        match sent {
            None => Err(self.cancelled()),
            Some(Ok(())) => {
                self.sent += 1;
                metrics::record_out(self.stage);
                Ok(true)
            }
            Some(Err(_)) => Ok(false),
        }
    }

    /// Write one item to every destination before returning.
    ///
    /// Destinations whose reader has gone are removed from `destinations`
    /// (and thereby closed); the others still receive the item.
    pub(crate) async fn broadcast<T: Clone>(
        &mut self,
        destinations: &mut Vec<Sender<T>>,
        item: T,
    ) -> Result<()> {
        let mut gone = Vec::new();

        if let Some((last, rest)) = destinations.split_last() {
            for (index, destination) in rest.iter().enumerate() {
                if !self.forward(destination, item.clone()).await? {
                    gone.push(index);
                }
            }
            if !self.forward(last, item).await? {
                gone.push(rest.len());
            }
        }

        for index in gone.into_iter().rev() {
            stage_warn!(
                stage = %self.stage,
                destination = index,
                "destination reader dropped, removing it from the broadcast"
            );
            destinations.remove(index);
        }

        Ok(())
    }

    /// Mark the worker closed. The caller drops its outputs right after.
    pub(crate) fn finish(mut self) -> Result<()> {
        self.transition(WorkerState::Draining);
        self.transition(WorkerState::Closed);
        Ok(())
    }
}

/// Spawn a stage worker on the current Tokio runtime.
pub(crate) fn spawn<F>(stage: StageKind, worker: F) -> JoinHandle<Result<()>>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    stage_debug!(stage = %stage, "spawning stage worker");
    #[cfg(not(feature = "tracing"))]
    let _ = stage;
    tokio::spawn(worker)
}

pub(crate) async fn run_filter<T, F>(
    mut source: Receiver<T>,
    output: Sender<T>,
    mut predicate: F,
    token: CancellationToken,
) -> Result<()>
where
    F: FnMut(&T) -> bool,
{
    let mut worker = Worker::new(StageKind::Filter, token);

    while let Some(item) = worker.next(&mut source).await? {
        if predicate(&item) && !worker.forward(&output, item).await? {
            break;
        }
    }

    worker.finish()
}

pub(crate) async fn run_transform<T, U, F>(
    mut source: Receiver<T>,
    output: Sender<U>,
    mut mapper: F,
    token: CancellationToken,
) -> Result<()>
where
    F: FnMut(T) -> U,
{
    let mut worker = Worker::new(StageKind::Transform, token);

    while let Some(item) = worker.next(&mut source).await? {
        if !worker.forward(&output, mapper(item)).await? {
            break;
        }
    }

    worker.finish()
}

pub(crate) async fn run_broadcast<T: Clone>(
    mut source: Receiver<T>,
    mut destinations: Vec<Sender<T>>,
    token: CancellationToken,
) -> Result<()> {
    let mut worker = Worker::new(StageKind::Broadcast, token);
    // With no destinations at all the source is still drained.
    let fan_out = !destinations.is_empty();

    while let Some(item) = worker.next(&mut source).await? {
        worker.broadcast(&mut destinations, item).await?;
        if fan_out && destinations.is_empty() {
            stage_debug!("every destination reader dropped, stopping broadcast");
            break;
        }
    }

    worker.finish()
}

pub(crate) async fn run_feed<S>(
    stream: S,
    output: Sender<S::Item>,
    token: CancellationToken,
) -> Result<()>
where
    S: Stream,
{
    let mut worker = Worker::new(StageKind::Feed, token);
    let mut stream = Box::pin(stream);

    while let Some(item) = worker.next(&mut stream).await? {
        if !worker.forward(&output, item).await? {
            break;
        }
    }

    worker.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{channel, from_iter};

    #[tokio::test]
    async fn test_worker_state_transitions() {
        let mut worker = Worker::new(StageKind::Filter, CancellationToken::new());
        let mut source = from_iter(vec![1]);
        assert_eq!(worker.state(), WorkerState::Running);

        assert_eq!(worker.next(&mut source).await.unwrap(), Some(1));
        assert_eq!(worker.state(), WorkerState::Running);

        assert_eq!(worker.next(&mut source).await.unwrap(), None);
        assert_eq!(worker.state(), WorkerState::Draining);
    }

    #[tokio::test]
    async fn test_worker_cancelled_while_waiting() {
        let token = CancellationToken::new();
        let mut worker = Worker::new(StageKind::Transform, token.clone());
        let (_tx, mut source) = channel::<u8>(1);

        token.cancel();
        let err = worker.next(&mut source).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Cancelled {
                stage: StageKind::Transform
            }
        ));
        assert_eq!(worker.state(), WorkerState::Closed);
    }

    #[tokio::test]
    async fn test_forward_to_dropped_reader() {
        let mut worker = Worker::new(StageKind::Transform, CancellationToken::new());
        let (tx, rx) = channel(1);
        drop(rx);
        assert!(!worker.forward(&tx, 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_broadcast_removes_gone_destinations() {
        let mut worker = Worker::new(StageKind::Broadcast, CancellationToken::new());
        let (first, first_rx) = channel(4);
        let (second, second_rx) = channel(4);
        let (third, third_rx) = channel(4);
        drop(second_rx);

        let mut destinations = vec![first, second, third];
        worker.broadcast(&mut destinations, "x").await.unwrap();
        assert_eq!(destinations.len(), 2);

        drop(destinations);
        assert_eq!(first_rx.collect_all().await, vec!["x"]);
        assert_eq!(third_rx.collect_all().await, vec!["x"]);
    }

    #[tokio::test]
    async fn test_broadcast_loop_stops_when_all_readers_leave() {
        let (upstream, source) = channel(1);
        let (first, first_rx) = channel::<u32>(1);
        let (second, second_rx) = channel::<u32>(1);
        drop(first_rx);
        drop(second_rx);

        let worker = tokio::spawn(run_broadcast(
            source,
            vec![first, second],
            CancellationToken::new(),
        ));
        upstream.send(1).await.unwrap();

        // The upstream stays open, so only the empty fan-out can end the loop.
        assert!(worker.await.unwrap().is_ok());
        assert!(upstream.is_closed());
    }

    #[tokio::test]
    async fn test_broadcast_loop_drains_without_destinations() {
        let (upstream, source) = channel(1);
        let worker = tokio::spawn(run_broadcast(
            source,
            Vec::<Sender<i32>>::new(),
            CancellationToken::new(),
        ));

        for item in 0..3 {
            upstream.send(item).await.unwrap();
        }
        upstream.close();
        assert!(worker.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_filter_loop_closes_output() {
        let (output, rx) = channel(8);
        run_filter(from_iter(1..=6), output, |x| x % 3 == 0, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(rx.collect_all().await, vec![3, 6]);
    }

    #[tokio::test]
    async fn test_feed_loop() {
        let (output, rx) = channel(8);
        run_feed(futures::stream::iter(vec!['a', 'b']), output, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(rx.collect_all().await, vec!['a', 'b']);
    }

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Broadcast.to_string(), "broadcast");
        assert_eq!(WorkerState::Draining.to_string(), "draining");
    }
}
