//! Validation System - Advisory Conformance
//!
//! Rules produce advisories. Nothing here ever rejects an image; a
//! non-conformant upload is still processed.

use image::{ColorType, DynamicImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::grayscale::is_grayscale;
use crate::orientation::{self, OrientationTag};
use crate::slots::SlotSpec;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    AspectRatio,
    Grayscale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceOutcome {
    pub slot_id: String,
    pub aspect_ok: bool,
    /// Always true for slots that do not require black-and-white.
    pub grayscale_ok: bool,
    pub overall_ok: bool,
    pub actual_ratio: f64,
    pub target_ratio: f64,
    pub advisories: Vec<Advisory>,
}

/// A decoded upload, owned for the duration of one call.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub slot_id: String,
    pub pixels: DynamicImage,
    pub orientation: Option<OrientationTag>,
    pub source_extension: String,
}

impl RawImage {
    /// Decode `bytes` and bring the pixels to viewing orientation.
    pub fn decode(slot_id: &str, bytes: &[u8], filename: &str) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| PipelineError::invalid_image(slot_id, e))?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(PipelineError::invalid_image(slot_id, "zero-sized image"));
        }

        let tag = orientation::read_orientation(bytes);
        Ok(Self {
            slot_id: slot_id.to_string(),
            pixels: orientation::apply_orientation(decoded, tag),
            orientation: tag,
            source_extension: source_extension(filename),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn color_mode(&self) -> ColorType {
        self.pixels.color()
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }
}

/// Lower-cased text after the last dot, or `jpg` when there is none.
pub fn source_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => "jpg".to_string(),
    }
}

/// `|actual - target| <= target * tolerance`. The band scales with the
/// target, so wide targets tolerate more absolute deviation.
pub fn check_aspect(actual_ratio: f64, target_ratio: f64, tolerance_fraction: f64) -> bool {
    (actual_ratio - target_ratio).abs() <= target_ratio * tolerance_fraction
}

/// Validation rule trait - produces advisories
pub trait ConformanceRule {
    fn name(&self) -> &'static str;
    fn applies_to(&self, spec: &SlotSpec) -> bool;
    fn check(&self, image: &RawImage, spec: &SlotSpec) -> Option<Advisory>;
}

// --- Concrete Rules ---

pub struct AspectRatioRule {
    pub tolerance: f64,
}

impl ConformanceRule for AspectRatioRule {
    fn name(&self) -> &'static str { "aspect_ratio" }

    fn applies_to(&self, _spec: &SlotSpec) -> bool { true }

    fn check(&self, image: &RawImage, spec: &SlotSpec) -> Option<Advisory> {
        let actual = image.aspect_ratio();
        let target = spec.target_ratio();
        if check_aspect(actual, target, self.tolerance) {
            return None;
        }

        Some(Advisory {
            kind: AdvisoryKind::AspectRatio,
            message: format!(
                "Aspect ratio deviates more than {:.0}% from the target; processing may crop substantially",
                self.tolerance * 100.0
            ),
            expected: Some(format!("{:.3} ({}x{})", target, spec.target_width, spec.target_height)),
            actual: Some(format!("{:.3} ({}x{})", actual, image.width(), image.height())),
        })
    }
}

pub struct GrayscaleRule;

impl ConformanceRule for GrayscaleRule {
    fn name(&self) -> &'static str { "grayscale" }

    fn applies_to(&self, spec: &SlotSpec) -> bool {
        spec.grayscale_required
    }

    fn check(&self, image: &RawImage, _spec: &SlotSpec) -> Option<Advisory> {
        if is_grayscale(&image.pixels) {
            return None;
        }

        Some(Advisory {
            kind: AdvisoryKind::Grayscale,
            message: "Brand guidelines call for black-and-white images in this slot".to_string(),
            expected: Some("black-and-white".to_string()),
            actual: Some(format!("{:?}", image.color_mode())),
        })
    }
}

/// Validator runs the rules in order: aspect first, then grayscale.
pub struct Validator {
    rules: Vec<Box<dyn ConformanceRule>>,
}

impl Validator {
    pub fn new(tolerance: f64) -> Self {
        Self {
            rules: vec![
                Box::new(AspectRatioRule { tolerance }),
                Box::new(GrayscaleRule),
            ],
        }
    }

    pub fn validate(&self, image: &RawImage, spec: &SlotSpec) -> ConformanceOutcome {
        let mut advisories = vec![];

        for rule in &self.rules {
            if !rule.applies_to(spec) {
                continue;
            }
            let advisory = rule.check(image, spec);
            debug!(slot = %spec.id, rule = rule.name(), passed = advisory.is_none(), "conformance rule");
            advisories.extend(advisory);
        }

        let aspect_ok = !advisories.iter().any(|a| a.kind == AdvisoryKind::AspectRatio);
        let grayscale_ok = !advisories.iter().any(|a| a.kind == AdvisoryKind::Grayscale);

        ConformanceOutcome {
            slot_id: spec.id.clone(),
            aspect_ok,
            grayscale_ok,
            overall_ok: aspect_ok && grayscale_ok,
            actual_ratio: image.aspect_ratio(),
            target_ratio: spec.target_ratio(),
            advisories,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(crate::slots::DEFAULT_ASPECT_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn raw(width: u32, height: u32, color: [u8; 3]) -> RawImage {
        RawImage {
            slot_id: "test".into(),
            pixels: DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color))),
            orientation: None,
            source_extension: "png".into(),
        }
    }

    #[test]
    fn test_equal_ratio_always_conforms() {
        for ratio in [0.75, 1.0, 16.0 / 9.0, 1080.0 / 680.0] {
            for tolerance in [0.0, 0.2, 0.3, 1.5] {
                assert!(check_aspect(ratio, ratio, tolerance));
            }
        }
    }

    #[test]
    fn test_tolerance_band_around_square() {
        assert!(check_aspect(1.15, 1.0, 0.2));
        assert!(!check_aspect(1.25, 1.0, 0.2));
    }

    #[test]
    fn test_tolerance_scales_with_target() {
        // same absolute deviation, different verdict
        assert!(check_aspect(16.0 / 9.0 + 0.3, 16.0 / 9.0, 0.2));
        assert!(!check_aspect(0.75 + 0.3, 0.75, 0.2));
    }

    #[test]
    fn test_source_extension() {
        assert_eq!(source_extension("photo.JPG"), "jpg");
        assert_eq!(source_extension("archive.tar.PNG"), "png");
        assert_eq!(source_extension("no_extension"), "jpg");
        assert_eq!(source_extension("trailing."), "jpg");
    }

    #[test]
    fn test_grayscale_rule_skipped_when_not_required() {
        let spec = SlotSpec::new("Concept_2", 1080, 1080);
        let outcome = Validator::new(0.2).validate(&raw(100, 100, [255, 0, 0]), &spec);
        assert!(outcome.aspect_ok);
        assert!(outcome.grayscale_ok);
        assert!(outcome.overall_ok);
        assert!(outcome.advisories.is_empty());
    }

    #[test]
    fn test_both_advisories_reported_independently() {
        let spec = SlotSpec::new("Chef_1", 900, 1200).grayscale();
        let outcome = Validator::new(0.2).validate(&raw(400, 100, [255, 0, 0]), &spec);
        assert!(!outcome.aspect_ok);
        assert!(!outcome.grayscale_ok);
        assert!(!outcome.overall_ok);
        assert_eq!(outcome.advisories.len(), 2);
        assert_eq!(outcome.advisories[0].kind, AdvisoryKind::AspectRatio);
        assert_eq!(outcome.advisories[1].kind, AdvisoryKind::Grayscale);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = RawImage::decode("Menu_1", b"definitely not a png", "menu.png").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidImage { slot_id, .. } if slot_id == "Menu_1"));
    }
}
