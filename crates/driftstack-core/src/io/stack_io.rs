use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use image::ColorType as ImgColor;
use ndarray::{Array2, Axis};
use num_traits::ToPrimitive;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::ColorType;
use tracing::{debug, info, warn};

use crate::error::{DriftError, Result};
use crate::frame::{AlignedStack, Frame, FrameStack, SourceInfo};
use crate::pipeline::{CancelToken, ProgressReporter};

/// Extensions accepted when reading a directory of frames.
const FRAME_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "jpg", "jpeg", "bmp"];

fn is_tiff(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("tif" | "tiff")
    )
}

/// Read a stack from a multi-page TIFF, a directory of frames, or a single
/// image file.
pub fn read_stack(path: &Path) -> Result<FrameStack> {
    if path.is_dir() {
        read_frame_dir(path)
    } else if is_tiff(path) {
        read_tiff_stack(path)
    } else {
        let (data, bit_depth) = load_image(path)?;
        FrameStack::new(vec![Frame::new(data, 0)], bit_depth)
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = BufReader::new(File::open(path)?);
    // Microscopy stacks routinely exceed the default decoder limits.
    Ok(Decoder::new(file)?.with_limits(Limits::unlimited()))
}

/// Read every page of a grayscale TIFF as one frame.
pub fn read_tiff_stack(path: &Path) -> Result<FrameStack> {
    let mut decoder = open_decoder(path)?;
    let mut frames = Vec::new();
    let mut bit_depth;

    loop {
        let (data, depth) = decode_page(&mut decoder, frames.len())?;
        bit_depth = depth;
        frames.push(Frame::new(data, frames.len()));
        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    info!(path = %path.display(), frames = frames.len(), bit_depth, "TIFF stack loaded");
    FrameStack::new(frames, bit_depth)
}

fn decode_page(decoder: &mut Decoder<BufReader<File>>, page: usize) -> Result<(Array2<f32>, u8)> {
    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(DriftError::UnsupportedFormat(format!(
                "page {page}: {other:?} (only grayscale stacks are supported)"
            )))
        }
    }
    let (w, h) = decoder.dimensions()?;
    let (values, bit_depth) = match decoder.read_image()? {
        DecodingResult::U8(buf) => (normalize(&buf, u8::MAX as f64), 8),
        DecodingResult::U16(buf) => (normalize(&buf, u16::MAX as f64), 16),
        DecodingResult::U32(buf) => (normalize(&buf, u32::MAX as f64), 32),
        DecodingResult::F32(buf) => (buf, 32),
        DecodingResult::F64(buf) => (normalize(&buf, 1.0), 32),
        _ => {
            return Err(DriftError::UnsupportedFormat(format!(
                "page {page}: unsupported sample type"
            )))
        }
    };
    let data = Array2::from_shape_vec((h as usize, w as usize), values).map_err(|e| {
        DriftError::UnsupportedFormat(format!("page {page}: {e}"))
    })?;
    Ok((data, bit_depth))
}

fn normalize<T: ToPrimitive + Copy>(buf: &[T], scale: f64) -> Vec<f32> {
    buf.iter()
        .map(|v| (v.to_f64().unwrap_or(0.0) / scale) as f32)
        .collect()
}

/// Load a single image through the `image` crate as grayscale f32 in [0, 1].
fn load_image(path: &Path) -> Result<(Array2<f32>, u8)> {
    let img = image::open(path)?;
    let bit_depth = match img.color() {
        ImgColor::L8 | ImgColor::La8 | ImgColor::Rgb8 | ImgColor::Rgba8 => 8,
        ImgColor::Rgb32F | ImgColor::Rgba32F => 32,
        _ => 16,
    };
    let gray = img.to_luma32f();
    let (w, h) = gray.dimensions();
    let data = Array2::from_shape_vec((h as usize, w as usize), gray.into_raw())
        .map_err(|e| DriftError::UnsupportedFormat(format!("{}: {e}", path.display())))?;
    Ok((data, bit_depth))
}

/// Read every image file of a directory, in natural filename order.
pub fn read_frame_dir(dir: &Path) -> Result<FrameStack> {
    let paths = frame_paths(dir)?;
    if paths.is_empty() {
        return Err(DriftError::EmptySequence);
    }

    let mut frames = Vec::with_capacity(paths.len());
    let mut bit_depth = 8;
    for (i, path) in paths.iter().enumerate() {
        debug!(path = %path.display(), index = i, "Reading frame");
        let (data, depth) = load_image(path)?;
        bit_depth = bit_depth.max(depth);
        frames.push(Frame::new(data, i));
    }

    info!(dir = %dir.display(), frames = frames.len(), "Frame directory loaded");
    FrameStack::new(frames, bit_depth)
}

fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let accepted = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && accepted {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NameChunk {
    Number(u128),
    Text(String),
}

fn natural_key(name: &str) -> Vec<NameChunk> {
    let mut chunks = Vec::new();
    let mut chars = name.chars().peekable();
    while let Some(&c) = chars.peek() {
        let digit = c.is_ascii_digit();
        let mut run = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() != digit {
                break;
            }
            run.push(c);
            chars.next();
        }
        let chunk = if digit {
            run.parse().map(NameChunk::Number).unwrap_or(NameChunk::Text(run))
        } else {
            NameChunk::Text(run.to_lowercase())
        };
        chunks.push(chunk);
    }
    chunks
}

/// Compare file names so that `img2` sorts before `img10`.
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b)).then_with(|| a.cmp(b))
}

/// Header-only look at a stack on disk.
pub fn stack_info(path: &Path) -> Result<SourceInfo> {
    if path.is_dir() {
        let paths = frame_paths(path)?;
        let first = paths.first().ok_or(DriftError::EmptySequence)?;
        let (data, bit_depth) = load_image(first)?;
        return Ok(SourceInfo {
            path: path.to_path_buf(),
            total_frames: paths.len(),
            width: data.ncols(),
            height: data.nrows(),
            bit_depth,
        });
    }

    if !is_tiff(path) {
        let (data, bit_depth) = load_image(path)?;
        return Ok(SourceInfo {
            path: path.to_path_buf(),
            total_frames: 1,
            width: data.ncols(),
            height: data.nrows(),
            bit_depth,
        });
    }

    let mut decoder = open_decoder(path)?;
    let (w, h) = decoder.dimensions()?;
    let bit_depth = match decoder.colortype()? {
        ColorType::Gray(bits) => bits,
        other => {
            return Err(DriftError::UnsupportedFormat(format!(
                "{other:?} (only grayscale stacks are supported)"
            )))
        }
    };
    let mut total_frames = 1;
    while decoder.more_images() {
        decoder.next_image()?;
        total_frames += 1;
    }
    Ok(SourceInfo {
        path: path.to_path_buf(),
        total_frames,
        width: w as usize,
        height: h as usize,
        bit_depth,
    })
}

/// Write the aligned stack as a multi-page TIFF: 32-bit float when the
/// source was 32-bit, 16-bit unsigned otherwise.
///
/// Frames go to a `.partial` sibling that is renamed into place only after
/// the last page, so a cancelled or failed run leaves no truncated output.
pub fn write_tiff_stack(
    stack: &AlignedStack,
    path: &Path,
    bit_depth: u8,
    reporter: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<()> {
    let partial = partial_path(path);
    let result = write_pages(stack, &partial, bit_depth, reporter, cancel);
    if let Err(e) = result {
        if let Err(cleanup) = std::fs::remove_file(&partial) {
            warn!(path = %partial.display(), error = %cleanup, "Could not remove partial output");
        }
        return Err(e);
    }
    std::fs::rename(&partial, path)?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn write_pages(
    stack: &AlignedStack,
    path: &Path,
    bit_depth: u8,
    reporter: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<()> {
    let (h, w) = stack.frame_shape();
    let mut writer = BufWriter::new(File::create(path)?);
    {
        let mut encoder = TiffEncoder::new(&mut writer)?;
        for page in stack.data.axis_iter(Axis(0)) {
            cancel.check()?;
            if bit_depth == 32 {
                let pixels: Vec<f32> = page.iter().copied().collect();
                encoder.write_image::<colortype::Gray32Float>(w as u32, h as u32, &pixels)?;
            } else {
                let pixels: Vec<u16> = page
                    .iter()
                    .map(|&v| (v.clamp(0.0, 1.0) * 65535.0).round() as u16)
                    .collect();
                encoder.write_image::<colortype::Gray16>(w as u32, h as u32, &pixels)?;
            }
            reporter.advance(1);
        }
    }
    writer.flush()?;
    debug!(path = %path.display(), frames = stack.len(), bit_depth, "TIFF pages written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_order() {
        let mut names = vec!["img10.tif", "img2.tif", "img1.tif", "IMG3.tif"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["img1.tif", "img2.tif", "IMG3.tif", "img10.tif"]);
    }

    #[test]
    fn test_partial_path_suffix() {
        let p = partial_path(Path::new("/tmp/out.tif"));
        assert_eq!(p, PathBuf::from("/tmp/out.tif.partial"));
    }
}
