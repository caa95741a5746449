//! Region-of-interest crop
//!
//! Maps a user-drawn rectangle, expressed in on-screen coordinates, into a
//! crop of a captured still. The supplied scale corrects for the
//! magnification between the rectangle's coordinate space and the still's
//! pixel space. A rectangle that lands outside the frame is a hard error:
//! clamping would silently run recognition on the wrong region.

use crate::capture::frame::Frame;
use crate::error::{ScanError, ScanResult};

/// Scale sentinel meaning "no region selected": the full frame passes
/// through untouched. A first-class mode, not an edge case.
pub const NO_CROP_SCALE: f64 = -1.0;

/// User-selected rectangle in on-screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegionOfInterest {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A rectangle resolved to whole pixels in the frame's own space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Crop a frame to a region of interest
///
/// With the no-crop sentinel the input frame is returned unchanged. The
/// source frame is never modified.
pub fn crop_frame(frame: &Frame, region: &RegionOfInterest, scale: f64) -> ScanResult<Frame> {
    if (scale - NO_CROP_SCALE).abs() < f64::EPSILON {
        return Ok(frame.clone());
    }

    let x = region.x * scale;
    let y = region.y * scale;
    let width = region.width * scale;
    let height = region.height * scale;

    let rect = PixelRect {
        x: x.round().max(0.0) as u32,
        y: y.round().max(0.0) as u32,
        width: width.round().max(0.0) as u32,
        height: height.round().max(0.0) as u32,
    };

    let (frame_width, frame_height) = frame.dimensions();
    let out_of_bounds = x < 0.0
        || y < 0.0
        || rect.x + rect.width > frame_width
        || rect.y + rect.height > frame_height;
    if out_of_bounds {
        return Err(ScanError::RegionOutOfBounds {
            region: rect,
            width: frame_width,
            height: frame_height,
        });
    }

    Ok(frame.sub_rect(rect.x, rect.y, rect.width, rect.height))
}
