//! Error types for pipe stages.
//!
//! Predicates and mappers are infallible, so nothing here flows back to the
//! producer. These errors only surface through a [`PipeHandle`](crate::PipeHandle)
//! or from a direct [`Sender::send`](crate::channel::Sender::send).

use thiserror::Error;

use crate::stage::StageKind;

/// The main error type for pipe stages.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The stage observed its cancellation token before upstream closed
    #[error("{stage} stage was cancelled")]
    Cancelled { stage: StageKind },

    /// The reading end of a stream was dropped
    #[error("Channel was closed unexpectedly")]
    ChannelClosed,

    /// A predicate or mapper panicked inside the worker
    #[error("{stage} stage panicked: {message}")]
    WorkerPanicked { stage: StageKind, message: String },

    /// The worker task was aborted by the runtime
    #[error("{stage} stage was aborted")]
    WorkerAborted { stage: StageKind },

    /// Several workers of one pipe failed
    #[error("Multiple errors occurred: {}", display_all(.0))]
    Multiple(Vec<Error>),
}

fn display_all(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|error| format!("[{}]", error))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Build an error from a failed worker join.
    pub(crate) fn from_join(stage: StageKind, err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            let payload = err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Error::WorkerPanicked { stage, message }
        } else {
            Error::WorkerAborted { stage }
        }
    }

    /// Collapse a list of failures into a single error, if any.
    pub(crate) fn collapse(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Multiple(errors)),
        }
    }

    /// Whether this error only reports a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled { .. } => true,
            Error::Multiple(errors) => errors.iter().all(Error::is_cancelled),
            _ => false,
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse() {
        assert!(Error::collapse(vec![]).is_none());
        assert!(matches!(
            Error::collapse(vec![Error::ChannelClosed]),
            Some(Error::ChannelClosed)
        ));
        assert!(matches!(
            Error::collapse(vec![Error::ChannelClosed, Error::ChannelClosed]),
            Some(Error::Multiple(errors)) if errors.len() == 2
        ));
    }

    #[test]
    fn test_display() {
        let err = Error::Multiple(vec![
            Error::Cancelled {
                stage: StageKind::Filter,
            },
            Error::ChannelClosed,
        ]);
        assert_eq!(
            err.to_string(),
            "Multiple errors occurred: [filter stage was cancelled], [Channel was closed unexpectedly]"
        );
    }

    #[test]
    fn test_is_cancelled() {
        let cancelled = Error::Cancelled {
            stage: StageKind::Broadcast,
        };
        assert!(cancelled.is_cancelled());
        assert!(Error::Multiple(vec![cancelled.clone(), cancelled]).is_cancelled());
        assert!(!Error::ChannelClosed.is_cancelled());
    }

    #[tokio::test]
    async fn test_from_join_panic() {
        let join_err = tokio::spawn(async {
            if true {
                panic!("boom");
            }
        })
        .await
        .unwrap_err();
        let err = Error::from_join(StageKind::Transform, join_err);
        assert!(matches!(
            err,
            Error::WorkerPanicked { stage: StageKind::Transform, ref message } if message == "boom"
        ));
    }
}
