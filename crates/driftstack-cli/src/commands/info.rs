use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use driftstack_core::io::stack_info;

#[derive(Args)]
pub struct InfoArgs {
    /// Multi-page TIFF, single image, or directory of frames
    pub path: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let info = stack_info(&args.path)
        .with_context(|| format!("Failed to inspect {}", args.path.display()))?;

    println!("Path:        {}", info.path.display());
    println!("Frames:      {}", info.total_frames);
    println!("Dimensions:  {}x{}", info.width, info.height);
    println!("Bit depth:   {}", info.bit_depth);

    let bytes_per_sample = (info.bit_depth as usize).div_ceil(8);
    let total_mb = (info.width * info.height * bytes_per_sample * info.total_frames) as f64
        / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}
