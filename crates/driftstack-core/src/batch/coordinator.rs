use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::consts::DEFAULT_LIVENESS_TIMEOUT_MS;
use crate::error::{DriftError, Result};
use crate::pipeline::{CancelToken, PipelineStage, StagePlan};

use super::channel::{ProgressMessage, ProgressSender};

/// Accumulated progress as seen by the supervisor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressUpdate {
    pub count: usize,
    pub total: usize,
    /// `100 * count / total`, capped at 100.
    pub percent: f64,
}

/// What a single `poll` observed.
#[derive(Debug)]
pub enum BatchEvent<T> {
    Progress(ProgressUpdate),
    /// The worker sent the completion sentinel and returned its result.
    Completed(T),
    /// The worker returned an error, died, or stopped reporting progress.
    Failed(DriftError),
}

/// Runs one unit of work on a dedicated thread with a progress channel.
pub struct BatchCoordinator {
    plan: StagePlan,
    liveness_timeout: Duration,
    thread_name: String,
}

impl BatchCoordinator {
    pub fn new(plan: StagePlan) -> Self {
        Self {
            plan,
            liveness_timeout: Duration::from_millis(DEFAULT_LIVENESS_TIMEOUT_MS),
            thread_name: "driftstack-worker".into(),
        }
    }

    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Spawn `work` on a worker thread and return the supervisor handle.
    ///
    /// The worker announces the plan total before `work` runs and sends the
    /// completion sentinel only if `work` returns `Ok`.
    pub fn start<T, F>(self, work: F) -> Result<BatchHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(Arc<ProgressSender>, CancelToken) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let total = self.plan.total();

        let worker_cancel = cancel.clone();
        let join = std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                let progress = Arc::new(ProgressSender::new(tx));
                progress.announce_total(total);
                let result = work(Arc::clone(&progress), worker_cancel);
                if result.is_ok() {
                    progress.finish();
                }
                result
            })?;

        info!(total_units = total, thread = %self.thread_name, "Batch started");

        Ok(BatchHandle {
            rx,
            join: Some(join),
            cancel,
            plan: self.plan,
            liveness_timeout: self.liveness_timeout,
            last_activity: Instant::now(),
            total: None,
            count: 0,
            state: State::Running,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Running,
    /// Sentinel seen; waiting for the worker thread to exit.
    Finishing,
    /// Channel closed without a sentinel; waiting to collect the error.
    Collapsing,
    Done,
}

/// Supervisor end of a running batch.
pub struct BatchHandle<T> {
    rx: mpsc::Receiver<ProgressMessage>,
    join: Option<JoinHandle<Result<T>>>,
    cancel: CancelToken,
    plan: StagePlan,
    liveness_timeout: Duration,
    last_activity: Instant,
    total: Option<usize>,
    count: usize,
    state: State,
}

impl<T> BatchHandle<T> {
    /// Check for news without blocking.
    ///
    /// Returns at most one event per call. After `Completed` or `Failed` has
    /// been returned, every later call returns `None`.
    pub fn poll(&mut self) -> Option<BatchEvent<T>> {
        match self.state {
            State::Done => None,
            State::Finishing | State::Collapsing => self.try_collect(),
            State::Running => self.poll_running(),
        }
    }

    /// Poll on a fixed `tick` until the batch ends, forwarding progress.
    pub fn wait(mut self, tick: Duration, mut on_progress: impl FnMut(&ProgressUpdate)) -> Result<T> {
        loop {
            match self.poll() {
                Some(BatchEvent::Progress(update)) => on_progress(&update),
                Some(BatchEvent::Completed(value)) => return Ok(value),
                Some(BatchEvent::Failed(e)) => return Err(e),
                None => std::thread::sleep(tick),
            }
        }
    }

    /// Ask the worker to stop at its next frame boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Latest accumulated progress, once the total is known.
    pub fn progress(&self) -> Option<ProgressUpdate> {
        self.total.map(|total| make_update(self.count, total))
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    fn poll_running(&mut self) -> Option<BatchEvent<T>> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => {
                    self.last_activity = Instant::now();
                    match msg {
                        ProgressMessage::Total(total) => {
                            debug!(total, "Progress total received");
                            self.total = Some(total);
                        }
                        ProgressMessage::Increment(units) => {
                            let Some(total) = self.total else {
                                return Some(self.fail(
                                    "progress increment received before the total".into(),
                                ));
                            };
                            self.count += units;
                            if self.count > total {
                                warn!(count = self.count, total, "Progress exceeds announced total");
                            }
                            return Some(BatchEvent::Progress(make_update(self.count, total)));
                        }
                        ProgressMessage::Finished => {
                            self.state = State::Finishing;
                            return self.try_collect();
                        }
                    }
                }
                Err(TryRecvError::Empty) => {
                    if self.last_activity.elapsed() > self.liveness_timeout {
                        let reason = format!(
                            "no progress for {:.1}s",
                            self.liveness_timeout.as_secs_f64()
                        );
                        return Some(self.fail(reason));
                    }
                    return None;
                }
                Err(TryRecvError::Disconnected) => {
                    self.state = State::Collapsing;
                    return self.try_collect();
                }
            }
        }
    }

    /// Join the worker once its thread has exited; never blocks on a live thread.
    fn try_collect(&mut self) -> Option<BatchEvent<T>> {
        let finished = self.join.as_ref().map_or(true, |j| j.is_finished());
        if !finished {
            if self.last_activity.elapsed() > self.liveness_timeout {
                return Some(self.fail("worker did not exit after its last message".into()));
            }
            return None;
        }

        let sentinel_seen = self.state == State::Finishing;
        let joined = self.join.take().map(|j| j.join());
        self.state = State::Done;

        let event = match joined {
            Some(Ok(Ok(value))) if sentinel_seen => {
                info!(units = self.count, "Batch completed");
                BatchEvent::Completed(value)
            }
            Some(Ok(Ok(_))) => self.failure_event("worker exited without completion sentinel".into()),
            Some(Ok(Err(e))) => {
                error!(stage = %self.current_stage(), error = %e, "Worker returned an error");
                BatchEvent::Failed(e)
            }
            Some(Err(panic)) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                self.failure_event(format!("worker panicked: {msg}"))
            }
            None => self.failure_event("worker handle already collected".into()),
        };
        Some(event)
    }

    /// Terminal failure while the worker may still be alive: cancel it and
    /// stop listening.
    fn fail(&mut self, reason: String) -> BatchEvent<T> {
        self.cancel.cancel();
        // A stalled thread cannot be joined without blocking; detach it.
        self.join.take();
        self.state = State::Done;
        self.failure_event(reason)
    }

    fn failure_event(&self, reason: String) -> BatchEvent<T> {
        let stage = self.current_stage();
        error!(%stage, units = self.count, %reason, "Worker failure");
        BatchEvent::Failed(DriftError::WorkerFailure { stage, reason })
    }

    fn current_stage(&self) -> PipelineStage {
        self.plan
            .stage_at(self.count)
            .unwrap_or(PipelineStage::Reading)
    }
}

impl<T> Drop for BatchHandle<T> {
    fn drop(&mut self) {
        if self.state != State::Done {
            self.cancel.cancel();
        }
    }
}

fn make_update(count: usize, total: usize) -> ProgressUpdate {
    let percent = if total == 0 {
        100.0
    } else {
        (100.0 * count as f64 / total as f64).min(100.0)
    };
    ProgressUpdate {
        count,
        total,
        percent,
    }
}
