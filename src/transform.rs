//! Resize-then-center-crop to exact target dimensions.

use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::{PipelineError, Result};

pub const JPEG_QUALITY: u8 = 95;

/// Largest intermediate canvas resampled in full. Past this the crop window
/// is mapped back onto the source and only that window is resampled.
pub const MAX_CANVAS_PIXELS: u64 = 40_000_000;

/// Scale so the constrained side matches the target, then crop the overhang
/// equally from both ends. Output is always exactly `target_width x target_height`.
pub fn resize_and_crop(img: &DynamicImage, target_width: u32, target_height: u32) -> Result<DynamicImage> {
    let (original_width, original_height) = img.dimensions();
    if original_width == 0 || original_height == 0 {
        return Err(PipelineError::invalid_image("", "zero-sized image"));
    }
    if target_width == 0 || target_height == 0 {
        return Err(PipelineError::invalid_image("", "zero-sized target"));
    }

    let target_ratio = target_width as f64 / target_height as f64;
    let original_ratio = original_width as f64 / original_height as f64;

    let (new_width, new_height) = scaled_size(original_ratio, target_ratio, target_width, target_height);
    let (left, top) = crop_origin(new_width, new_height, target_width, target_height);

    if new_width as u64 * new_height as u64 > MAX_CANVAS_PIXELS {
        let (x, y, w, h) = source_window(
            (original_width, original_height),
            (new_width, new_height),
            (left, top),
            (target_width, target_height),
        );
        return Ok(img.crop_imm(x, y, w, h).resize_exact(target_width, target_height, FilterType::Lanczos3));
    }

    let scaled = if (new_width, new_height) == (original_width, original_height) {
        img.clone()
    } else {
        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
    };

    Ok(scaled.crop_imm(left, top, target_width, target_height))
}

/// Truncating scale of the unconstrained side, floored at the target so the
/// crop window always fits.
fn scaled_size(original_ratio: f64, target_ratio: f64, target_width: u32, target_height: u32) -> (u32, u32) {
    if original_ratio > target_ratio {
        let new_width = (target_height as f64 * original_ratio) as u32;
        (new_width.max(target_width), target_height)
    } else {
        let new_height = (target_width as f64 / original_ratio) as u32;
        (target_width, new_height.max(target_height))
    }
}

fn crop_origin(new_width: u32, new_height: u32, target_width: u32, target_height: u32) -> (u32, u32) {
    ((new_width - target_width) / 2, (new_height - target_height) / 2)
}

/// The crop window `(left, top, target)` on the scaled canvas, expressed in
/// source pixels. Each side is at least one pixel and stays inside the source.
fn source_window(
    (original_width, original_height): (u32, u32),
    (new_width, new_height): (u32, u32),
    (left, top): (u32, u32),
    (target_width, target_height): (u32, u32),
) -> (u32, u32, u32, u32) {
    let axis = |original: u32, scaled: u32, offset: u32, target: u32| {
        let scale = scaled as f64 / original as f64;
        let start = ((offset as f64 / scale) as u32).min(original - 1);
        let len = ((target as f64 / scale).round() as u32).clamp(1, original - start);
        (start, len)
    };

    let (x, w) = axis(original_width, new_width, left, target_width);
    let (y, h) = axis(original_height, new_height, top, target_height);
    (x, y, w, h)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// jpg/jpeg and anything unrecognized map to JPEG.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            _ => Self::Jpeg,
        }
    }
}

pub fn encode(img: &DynamicImage, format: OutputFormat) -> std::result::Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());

    match format {
        OutputFormat::Png => img.write_to(&mut buffer, ImageOutputFormat::Png)?,
        OutputFormat::Jpeg => {
            // JPEG carries no alpha and no 16-bit samples
            let jpeg_ready = match img.color() {
                ColorType::L8 | ColorType::Rgb8 => None,
                ColorType::L16 => Some(DynamicImage::ImageLuma8(img.to_luma8())),
                _ => Some(DynamicImage::ImageRgb8(img.to_rgb8())),
            };
            jpeg_ready
                .as_ref()
                .unwrap_or(img)
                .write_to(&mut buffer, ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
        }
    }

    Ok(buffer.into_inner())
}
