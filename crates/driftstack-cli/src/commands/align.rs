use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use driftstack_core::align::{Boundary, FailurePolicy, Interpolation};
use driftstack_core::crop::CropMode;
use driftstack_core::io::read_stack;
use driftstack_core::pipeline::{plan_for, spawn_alignment, AlignConfig};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::summary::{print_align_summary, print_result_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum CropModeArg {
    BoundingBox,
    ExactMask,
}

impl From<CropModeArg> for CropMode {
    fn from(arg: CropModeArg) -> Self {
        match arg {
            CropModeArg::BoundingBox => CropMode::BoundingBox,
            CropModeArg::ExactMask => CropMode::ExactMask,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum InterpolationArg {
    Nearest,
    Bilinear,
}

impl From<InterpolationArg> for Interpolation {
    fn from(arg: InterpolationArg) -> Self {
        match arg {
            InterpolationArg::Nearest => Interpolation::Nearest,
            InterpolationArg::Bilinear => Interpolation::Bilinear,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum BoundaryArg {
    Zero,
    Edge,
}

impl From<BoundaryArg> for Boundary {
    fn from(arg: BoundaryArg) -> Self {
        match arg {
            BoundaryArg::Zero => Boundary::Zero,
            BoundaryArg::Edge => Boundary::Edge,
        }
    }
}

#[derive(Args)]
pub struct AlignArgs {
    /// Multi-page TIFF or directory of frames
    pub input: PathBuf,

    /// Alignment config file (TOML); flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// First frame to process (inclusive)
    #[arg(long)]
    pub index_min: Option<usize>,

    /// Last frame to process (inclusive, clamped to the stack)
    #[arg(long)]
    pub index_max: Option<usize>,

    /// How the common valid region is found
    #[arg(long, value_enum)]
    pub crop: Option<CropModeArg>,

    /// Worker threads for shift estimation
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    #[arg(long, value_enum)]
    pub interpolation: Option<InterpolationArg>,

    /// Fill for samples outside the source frame
    #[arg(long, value_enum)]
    pub boundary: Option<BoundaryArg>,

    /// Substitute a zero shift when a frame pair cannot be registered
    #[arg(long)]
    pub skip_failures: bool,

    /// Disable the Hann window before phase correlation
    #[arg(long)]
    pub no_window: bool,

    /// Minimum correlation peak height
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Write shifts.txt and shifts_cumul.txt next to the output
    #[arg(long)]
    pub save_shifts: bool,

    /// Output file path
    #[arg(short, long, default_value = "aligned.tif")]
    pub output: PathBuf,
}

pub fn run(args: &AlignArgs) -> Result<()> {
    let config = build_config(args)?;
    config.validate().context("Invalid alignment config")?;
    debug!(?config, "Resolved alignment config");

    let stack = read_stack(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let frames = stack
        .range_len(config.index_min, config.index_max)
        .context("Invalid frame range")?;
    info!(path = %args.input.display(), total = stack.len(), selected = frames, "Stack loaded");

    print_align_summary(&config, &args.input, &args.output, frames);

    let plan = plan_for(frames, &config, true);
    let pb = ProgressBar::new(plan.total() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}/{len} ({percent}%)")?
            .progress_chars("=> "),
    );

    let tick = config.poll_interval();
    let handle = spawn_alignment(Arc::new(stack), config, Some(args.output.clone()))?;
    let output = handle.wait(tick, |update| {
        if let Some(stage) = plan.stage_at(update.count) {
            pb.set_message(stage.to_string());
        }
        pb.set_length(update.total as u64);
        pb.set_position(update.count as u64);
    });

    match output {
        Ok(output) => {
            pb.finish_with_message("Done");
            print_result_summary(&output, &args.output);
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("Failed");
            Err(e).context("Alignment failed")
        }
    }
}

fn build_config(args: &AlignArgs) -> Result<AlignConfig> {
    let mut config = if let Some(ref path) = args.config {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).context("Invalid alignment config")?
    } else {
        AlignConfig::default()
    };

    if let Some(v) = args.index_min {
        config.index_min = v;
    }
    if let Some(v) = args.index_max {
        config.index_max = v;
    }
    if let Some(v) = args.crop {
        config.crop_mode = v.into();
    }
    if let Some(v) = args.workers {
        config.num_workers = v;
    }
    if let Some(v) = args.interpolation {
        config.interpolation = v.into();
    }
    if let Some(v) = args.boundary {
        config.boundary = v.into();
    }
    if args.skip_failures {
        config.on_estimation_failure = FailurePolicy::Skip;
    }
    if args.no_window {
        config.estimator.window = false;
    }
    if let Some(v) = args.min_confidence {
        config.estimator.min_confidence = v;
    }
    if args.save_shifts {
        config.save_shifts = true;
    }

    Ok(config)
}
