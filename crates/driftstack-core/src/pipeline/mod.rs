pub mod config;
mod context;
mod orchestrator;
mod types;

pub use config::AlignConfig;
pub use context::{CancelToken, RunContext};
pub use orchestrator::{plan_for, run_alignment, run_alignment_to_file, spawn_alignment};
pub use types::{AlignmentOutput, NoOpReporter, PipelineStage, ProgressReporter, StagePlan};
