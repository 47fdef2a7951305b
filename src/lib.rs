//! # Composable channel pipelines
//!
//! `pipeweld` wraps the reading end of a Tokio channel in a [`Pipe`] and
//! offers operators that build new pipes lazily. Each operator runs as its
//! own task, connected to its neighbours by bounded streams.
//!
//! ## Core Concepts
//!
//! - **Pipe**: a handle over one readable stream
//! - **filter / transform**: one worker per call, strictly in order
//! - **to**: lockstep broadcast to any number of destinations, which it closes
//! - **receive**: the underlying stream, untouched
//!
//! A stream has a single [`Sender`](channel::Sender), which cannot be cloned
//! and is consumed by `close`, so a stream is closed exactly once.
//!
//! ## Example
//!
//! ```rust
//! use pipeweld::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let source = from_iter(vec![1, 2, 3, 4, 5]);
//!     let (first, first_rx) = channel(5);
//!     let (second, second_rx) = channel(5);
//!
//!     let handle = Pipe::from(source)
//!         .filter(|x| x % 2 == 1)
//!         .transform(|x| x * 100)
//!         .to([first, second]);
//!
//!     assert_eq!(first_rx.collect_all().await, vec![100, 300, 500]);
//!     assert_eq!(second_rx.collect_all().await, vec![100, 300, 500]);
//!     handle.join().await
//! }
//! ```

#[macro_use]
mod tracing_support;

pub mod channel;
pub mod error;
pub mod metrics;
pub mod pipe;
pub mod stage;

// Re-export commonly used items
pub mod prelude {
    pub use crate::channel::{channel, from_iter, Receiver, Sender};
    pub use crate::error::{Error, Result};
    pub use crate::pipe::{Pipe, PipeConfig, PipeHandle};
    pub use crate::stage::StageKind;
}

pub use error::{Error, Result};
pub use pipe::{Pipe, PipeConfig, PipeHandle};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
