use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use tracing::debug;

use crate::pipeline::{PipelineStage, ProgressReporter};

/// One message on the worker → supervisor progress channel.
///
/// The first message is always `Total`; `Increment`s follow; `Finished` is
/// the completion sentinel and the last message of a successful run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressMessage {
    Total(usize),
    Increment(usize),
    Finished,
}

/// Worker end of the progress channel.
///
/// Enforces the protocol order: the total goes out once and first, the
/// sentinel at most once and last.
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressMessage>,
    total_sent: AtomicBool,
    finished: AtomicBool,
}

impl ProgressSender {
    pub(crate) fn new(tx: mpsc::Sender<ProgressMessage>) -> Self {
        Self {
            tx,
            total_sent: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    /// Announce the total unit count. Later calls are ignored.
    pub fn announce_total(&self, total: usize) {
        if !self.total_sent.swap(true, Ordering::AcqRel) {
            self.send(ProgressMessage::Total(total));
        }
    }

    /// Report `units` more units done. Zero-unit increments are not sent.
    pub fn increment(&self, units: usize) {
        debug_assert!(
            self.total_sent.load(Ordering::Acquire),
            "increment sent before the total"
        );
        if units > 0 && !self.finished.load(Ordering::Acquire) {
            self.send(ProgressMessage::Increment(units));
        }
    }

    /// Send the completion sentinel. Only the first call has an effect.
    pub(crate) fn finish(&self) {
        if !self.finished.swap(true, Ordering::AcqRel) {
            self.send(ProgressMessage::Finished);
        }
    }

    fn send(&self, msg: ProgressMessage) {
        // A vanished supervisor is not the worker's problem.
        let _ = self.tx.send(msg);
    }
}

impl ProgressReporter for ProgressSender {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        debug!(%stage, units = ?total_items, "Stage started");
    }

    fn advance(&self, items: usize) {
        self.increment(items);
    }
}
