use std::path::Path;

use console::Style;
use driftstack_core::pipeline::{AlignConfig, AlignmentOutput};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    warning: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            warning: Style::new().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_align_summary(config: &AlignConfig, input: &Path, output: &Path, frames: usize) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Drift Correction"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(16)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(format!(
            "{frames} (from index {})",
            config.index_min
        ))
    );
    println!();

    println!("  {}", s.header.apply_to("Registration"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Estimator"),
        s.method.apply_to(&config.estimator)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Workers"),
        s.value.apply_to(config.num_workers)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("On failure"),
        s.value.apply_to(config.on_estimation_failure)
    );
    println!();

    println!("  {}", s.header.apply_to("Resampling"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Interp"),
        s.method.apply_to(config.interpolation)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Boundary"),
        s.value.apply_to(config.boundary)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Crop"),
        s.method.apply_to(config.crop_mode)
    );
    println!();
}

pub fn print_result_summary(result: &AlignmentOutput, output: &Path) {
    let s = Styles::new();
    let (h, w) = result.stack.frame_shape();

    println!();
    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Crop"),
        s.value.apply_to(result.stack.crop)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Size"),
        s.value.apply_to(format!("{} x {w}x{h}", result.stack.len()))
    );
    if let Some(last) = result.records.last() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Total drift"),
            s.value.apply_to(format!(
                "dx {:+.2}, dy {:+.2}",
                last.cumulative.dx, last.cumulative.dy
            ))
        );
    }
    let fallbacks = result.fallback_count();
    if fallbacks > 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Fallbacks"),
            s.warning.apply_to(format!("{fallbacks} frame(s) used a zero shift"))
        );
    }
    println!();
    println!("  Output saved to {}", s.path.apply_to(output.display()));
}
