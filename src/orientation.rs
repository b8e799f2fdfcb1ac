//! EXIF orientation normalization.
//!
//! Only the pure rotations are honored: 3 (180°), 6 (90° CW), 8 (90° CCW).
//! Mirrored orientations and unknown values pass through untouched.

use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// EXIF orientation tag value (0x0112).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationTag(pub u32);

impl OrientationTag {
    pub const NORMAL: Self = Self(1);
    pub const ROTATE_180: Self = Self(3);
    pub const ROTATE_90_CW: Self = Self(6);
    pub const ROTATE_90_CCW: Self = Self(8);
}

/// Read the orientation tag from raw container bytes.
///
/// Any read failure, including formats that carry no EXIF at all, is "no tag".
pub fn read_orientation(bytes: &[u8]) -> Option<OrientationTag> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(OrientationTag)
}

/// Rotate decoded pixels to viewing orientation. Quarter turns swap the
/// canvas dimensions, so nothing is clipped.
pub fn apply_orientation(img: DynamicImage, tag: Option<OrientationTag>) -> DynamicImage {
    match tag {
        Some(OrientationTag::ROTATE_180) => img.rotate180(),
        Some(OrientationTag::ROTATE_90_CW) => img.rotate90(),
        Some(OrientationTag::ROTATE_90_CCW) => img.rotate270(),
        Some(other) => {
            if other != OrientationTag::NORMAL {
                debug!(tag = other.0, "ignoring non-rotation orientation tag");
            }
            img
        }
        None => img,
    }
}
