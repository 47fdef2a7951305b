//! Joinable handles for the workers behind a pipe.

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::stage::StageKind;

/// The workers spawned for one chain of operators.
///
/// Dropping a `PipeHandle` detaches its workers; they keep running until
/// their upstream closes or the pipe is cancelled.
#[derive(Debug)]
pub struct PipeHandle {
    workers: Vec<(StageKind, JoinHandle<Result<()>>)>,
    token: CancellationToken,
}

impl PipeHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self {
            workers: Vec::new(),
            token,
        }
    }

    pub(crate) fn push(&mut self, stage: StageKind, worker: JoinHandle<Result<()>>) {
        self.workers.push((stage, worker));
    }

    /// The operators in the chain, upstream first.
    pub fn stages(&self) -> Vec<StageKind> {
        self.workers.iter().map(|(stage, _)| *stage).collect()
    }

    /// Number of workers in the chain
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Whether every worker has returned.
    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|(_, worker)| worker.is_finished())
    }

    /// Cancel every worker sharing this pipe's token.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for every worker to return.
    ///
    /// A panicking predicate or mapper is reported as
    /// [`Error::WorkerPanicked`]; several failures become [`Error::Multiple`].
    pub async fn join(self) -> Result<()> {
        let (stages, workers): (Vec<_>, Vec<_>) = self.workers.into_iter().unzip();
        let results = join_all(workers).await;

        let errors = stages
            .into_iter()
            .zip(results)
            .filter_map(|(stage, result)| match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(e) => Some(Error::from_join(stage, e)),
            })
            .collect();

        match Error::collapse(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
