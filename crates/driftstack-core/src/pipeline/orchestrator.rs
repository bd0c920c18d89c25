use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::align::{estimation_units, DriftAccumulator};
use crate::batch::{BatchCoordinator, BatchHandle};
use crate::crop::{crop_stack, find_valid_region};
use crate::error::Result;
use crate::frame::FrameStack;
use crate::io::{save_shift_tables, write_tiff_stack};

use super::config::AlignConfig;
use super::context::RunContext;
use super::types::{AlignmentOutput, PipelineStage, StagePlan};

/// Work units of an alignment run over `frames` frames: shift estimation
/// (with chunk overlap), resampling, cropping, and writing when an output
/// file is requested.
pub fn plan_for(frames: usize, config: &AlignConfig, writes_output: bool) -> StagePlan {
    let mut stages = vec![
        (
            PipelineStage::ShiftEstimation,
            estimation_units(frames, config.num_workers),
        ),
        (PipelineStage::Transformation, frames),
        (PipelineStage::Cropping, frames),
    ];
    if writes_output {
        stages.push((PipelineStage::Writing, frames));
    }
    StagePlan::new(stages)
}

/// Align the configured frame range of `ctx.stack` and crop it to the
/// region valid in every frame.
pub fn run_alignment(ctx: &RunContext) -> Result<AlignmentOutput> {
    let config = &ctx.config;
    config.validate()?;

    let stack = ctx.stack.select_range(config.index_min, config.index_max)?;
    let (h, w) = stack.shape();
    info!(
        frames = stack.len(),
        width = w,
        height = h,
        crop_mode = %config.crop_mode,
        workers = config.num_workers,
        "Aligning stack"
    );

    let accumulator = DriftAccumulator::new(&config.estimator)
        .with_resampler(config.resampler())
        .with_policy(config.resample_policy())
        .with_failure_policy(config.on_estimation_failure)
        .with_workers(config.num_workers);
    let drift = accumulator.align_reported(stack.frames(), ctx.reporter.as_ref(), &ctx.cancel)?;
    ctx.cancel.check()?;

    ctx.reporter
        .begin_stage(PipelineStage::Cropping, Some(drift.resampled.len()));
    let rect = find_valid_region(
        config.crop_mode,
        &drift.cumulative(),
        drift.mask.as_ref(),
        (h, w),
    )?;
    let aligned = crop_stack(&drift.resampled, rect, ctx.reporter.as_ref())?;
    ctx.reporter.finish_stage();

    Ok(AlignmentOutput {
        stack: aligned,
        records: drift.records,
    })
}

/// Align, then write the cropped stack (and shift tables when requested).
pub fn run_alignment_to_file(ctx: &RunContext, output: &Path) -> Result<AlignmentOutput> {
    let result = run_alignment(ctx)?;

    ctx.reporter
        .begin_stage(PipelineStage::Writing, Some(result.stack.len()));
    write_tiff_stack(
        &result.stack,
        output,
        ctx.stack.bit_depth,
        ctx.reporter.as_ref(),
        &ctx.cancel,
    )?;
    if ctx.config.save_shifts {
        let dir = output
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        save_shift_tables(&dir, &result.records)?;
    }
    ctx.reporter.finish_stage();

    info!(path = %output.display(), frames = result.stack.len(), "Aligned stack written");
    Ok(result)
}

/// Run the alignment on a worker thread; poll the returned handle for
/// progress. With `output` set, the worker also writes the result.
pub fn spawn_alignment(
    stack: Arc<FrameStack>,
    config: AlignConfig,
    output: Option<PathBuf>,
) -> Result<BatchHandle<AlignmentOutput>> {
    config.validate()?;
    let frames = stack.range_len(config.index_min, config.index_max)?;
    let plan = plan_for(frames, &config, output.is_some());

    BatchCoordinator::new(plan)
        .with_liveness_timeout(config.liveness_timeout())
        .start(move |progress, cancel| {
            let ctx = RunContext::new(stack, config)
                .with_reporter(progress)
                .with_cancel(cancel);
            match output {
                Some(path) => run_alignment_to_file(&ctx, &path),
                None => run_alignment(&ctx),
            }
        })
}
