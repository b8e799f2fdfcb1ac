//! Black-and-white detection.
//!
//! Every pixel is visited. There is no sampling: one colored pixel is enough
//! to fail, so callers should expect cost proportional to the full resolution.

use image::{ColorType, DynamicImage};

/// Maximum channel spread (exclusive) for a pixel to count as neutral.
pub const CHANNEL_TOLERANCE: i16 = 15;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static SCAN_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_scan_count() -> u32 {
    SCAN_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_scan_count() {
    SCAN_COUNT.store(0, Ordering::SeqCst);
}

pub fn is_grayscale(img: &DynamicImage) -> bool {
    if matches!(img.color(), ColorType::L8 | ColorType::L16) {
        return true;
    }

    #[cfg(feature = "test-hooks")]
    SCAN_COUNT.fetch_add(1, Ordering::SeqCst);

    img.to_rgb8().pixels().all(|p| {
        let [r, g, b] = p.0.map(i16::from);
        (r - g).abs() < CHANNEL_TOLERANCE
            && (g - b).abs() < CHANNEL_TOLERANCE
            && (b - r).abs() < CHANNEL_TOLERANCE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn test_luminance_is_always_grayscale() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([200])));
        assert!(is_grayscale(&img));
    }

    #[test]
    fn test_neutral_rgb_is_grayscale() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([128, 128, 128])));
        assert!(is_grayscale(&img));
    }

    #[test]
    fn test_single_blue_pixel_fails() {
        let mut buf = RgbImage::from_pixel(16, 16, Rgb([128, 128, 128]));
        buf.put_pixel(15, 15, Rgb([0, 0, 255]));
        assert!(!is_grayscale(&DynamicImage::ImageRgb8(buf)));
    }

    #[test]
    fn test_tolerance_is_exclusive() {
        let near = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([100, 114, 100])));
        assert!(is_grayscale(&near));

        let at_limit = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([100, 115, 100])));
        assert!(!is_grayscale(&at_limit));
    }

    #[test]
    fn test_sepia_tint_fails() {
        let sepia = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([112, 66, 20])));
        assert!(!is_grayscale(&sepia));
    }

    #[test]
    fn test_rgba_is_scanned_on_color_channels() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([90, 90, 90, 0])));
        assert!(is_grayscale(&img));
    }
}
