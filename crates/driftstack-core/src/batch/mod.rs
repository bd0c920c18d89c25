//! Isolated batch execution with a one-way progress channel.
//!
//! The worker thread announces a total unit count, streams increments and
//! closes with a completion sentinel. The supervisor polls without blocking
//! and turns the stream into progress updates and exactly one terminal
//! event. A dropped channel without a sentinel, a panic, or a silence longer
//! than the liveness timeout all end in `Failed`, never `Completed`.

mod channel;
mod coordinator;

pub use channel::{ProgressMessage, ProgressSender};
pub use coordinator::{BatchCoordinator, BatchEvent, BatchHandle, ProgressUpdate};
