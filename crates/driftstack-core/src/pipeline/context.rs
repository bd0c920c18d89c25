use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DriftError, Result};
use crate::frame::FrameStack;

use super::config::AlignConfig;
use super::types::{NoOpReporter, ProgressReporter};

/// Cooperative cancellation flag, checked by the worker between frames.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DriftError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Everything one alignment run needs, owned by the caller of the pipeline.
pub struct RunContext {
    pub stack: Arc<FrameStack>,
    pub config: AlignConfig,
    pub reporter: Arc<dyn ProgressReporter>,
    pub cancel: CancelToken,
}

impl RunContext {
    pub fn new(stack: Arc<FrameStack>, config: AlignConfig) -> Self {
        Self {
            stack,
            config,
            reporter: Arc::new(NoOpReporter),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}
