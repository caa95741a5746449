//! Live-to-still frame extraction
//!
//! Produces a still that visually matches the *displayed* video, not the
//! sensor's native frame: the on-screen video is cover-fitted, so the still
//! is the centered, full-height slice of the native frame whose width covers
//! the displayed box. Extraction waits for the source's next refresh so the
//! sampled pixels belong to the most recently decoded frame, never a stale
//! buffer.

use tracing::debug;

use super::frame::Frame;
use super::layout::{cover_sample_rect, DisplayGeometry};
use super::VideoSource;
use crate::error::{ScanError, ScanResult};

/// Extract a still frame matching the displayed video geometry
pub async fn extract_still(source: &mut dyn VideoSource) -> ScanResult<Frame> {
    if !source.is_live() {
        return Err(ScanError::NotConnected);
    }

    let geometry = DisplayGeometry::new(source.native_size(), source.display_size());
    let sample = cover_sample_rect(&geometry);

    let frame = source.next_frame().await?;
    let (frame_width, frame_height) = frame.dimensions();

    // The cover fit keeps the sample inside the native frame; rounding can
    // still land one pixel outside, so the blit clamps after rounding.
    let x = (sample.x.round().max(0.0) as u32).min(frame_width);
    let y = (sample.y.round().max(0.0) as u32).min(frame_height);
    let width = (sample.width.round() as u32).min(frame_width - x);
    let height = (sample.height.round() as u32).min(frame_height - y);
    if width == 0 || height == 0 {
        return Err(ScanError::Capture(format!(
            "sampling rectangle {:?} collapsed for {}x{} frame",
            sample, frame_width, frame_height
        )));
    }

    debug!(
        "Extracting {}x{} still at ({}, {}) from {}x{} native frame",
        width, height, x, y, frame_width, frame_height
    );

    Ok(frame.sub_rect(x, y, width, height))
}
