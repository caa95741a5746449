//! On-screen layout and display-to-native coordinate mapping
//!
//! The live video is shown scaled and cropped (cover fit), so on-screen
//! coordinates never match the sensor's native pixel grid. Everything that
//! maps between the two spaces goes through [`DisplayGeometry::scale`]: the
//! vertical ratio is the single source of truth, and horizontal extents are
//! derived from it, because the displayed box may be letterboxed or cropped
//! horizontally and reports no usable horizontal scale of its own.

/// How the video element fills the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportFill {
    /// Landscape viewport: stretch to the full viewport, cover-cropped
    FillWidth,
    /// Portrait (or square) viewport: lock height, width follows the sensor
    FillHeight,
}

/// Pick the fill mode for a viewport; a square viewport behaves as portrait.
pub fn viewport_fill(viewport_width: f64, viewport_height: f64) -> ViewportFill {
    if viewport_width / viewport_height > 1.0 {
        ViewportFill::FillWidth
    } else {
        ViewportFill::FillHeight
    }
}

/// On-screen size of the video element, in display pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

/// Compute the displayed video rectangle for a viewport
///
/// Landscape fills the whole viewport (the cover fit crops the sensor frame);
/// portrait locks the height and derives the width from the sensor's aspect
/// ratio.
pub fn layout_display_size(
    native_width: u32,
    native_height: u32,
    viewport_width: f64,
    viewport_height: f64,
) -> DisplaySize {
    match viewport_fill(viewport_width, viewport_height) {
        ViewportFill::FillWidth => DisplaySize {
            width: viewport_width,
            height: viewport_height,
        },
        ViewportFill::FillHeight => DisplaySize {
            width: viewport_height * native_width as f64 / native_height as f64,
            height: viewport_height,
        },
    }
}

/// Native sensor dimensions paired with the current on-screen size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub native_width: u32,
    pub native_height: u32,
    pub display_width: f64,
    pub display_height: f64,
}

impl DisplayGeometry {
    pub fn new(native: (u32, u32), displayed: DisplaySize) -> Self {
        Self {
            native_width: native.0,
            native_height: native.1,
            display_width: displayed.width,
            display_height: displayed.height,
        }
    }

    /// Display-to-native scale factor, defined by the vertical ratio only
    pub fn scale(&self) -> f64 {
        self.native_height as f64 / self.display_height
    }
}

/// Sub-rectangle of the native frame to sample, in native pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Sampling rectangle for the cover fit
///
/// Assumes the displayed video fits the frame by height and center-crops
/// horizontally. Any other fit policy supplies its own rectangle function;
/// extraction itself never hard-codes the policy.
pub fn cover_sample_rect(geometry: &DisplayGeometry) -> SampleRect {
    let scale = geometry.scale();
    let sampled_width = geometry.display_width * scale;

    SampleRect {
        x: (geometry.native_width as f64 - sampled_width) / 2.0,
        y: 0.0,
        width: sampled_width,
        height: geometry.native_height as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_viewport_fills_width() {
        assert_eq!(viewport_fill(800.0, 600.0), ViewportFill::FillWidth);

        let size = layout_display_size(1920, 1080, 800.0, 600.0);
        assert_eq!(size.width, 800.0);
        assert_eq!(size.height, 600.0);
    }

    #[test]
    fn test_portrait_viewport_fills_height() {
        assert_eq!(viewport_fill(600.0, 800.0), ViewportFill::FillHeight);

        let size = layout_display_size(1920, 1080, 600.0, 800.0);
        assert_eq!(size.height, 800.0);
        // Width derived from the sensor aspect ratio
        assert!((size.width - 800.0 * 1920.0 / 1080.0).abs() < 1e-9);
    }

    #[test]
    fn test_square_viewport_behaves_as_portrait() {
        assert_eq!(viewport_fill(500.0, 500.0), ViewportFill::FillHeight);
    }

    #[test]
    fn test_scale_is_vertical_ratio() {
        let geometry = DisplayGeometry::new(
            (1920, 1080),
            DisplaySize {
                width: 400.0,
                height: 800.0,
            },
        );
        assert!((geometry.scale() - 1.35).abs() < 1e-9);
    }

    #[test]
    fn test_cover_sample_rect_is_centered_full_height() {
        let geometry = DisplayGeometry::new(
            (1920, 1080),
            DisplaySize {
                width: 400.0,
                height: 800.0,
            },
        );
        let rect = cover_sample_rect(&geometry);

        // 400 * 1.35 = 540 native pixels wide, centered: (1920 - 540) / 2
        assert!((rect.width - 540.0).abs() < 1e-9);
        assert!((rect.x - 690.0).abs() < 1e-9);
        assert_eq!(rect.y, 0.0);
        assert_eq!(rect.height, 1080.0);
    }

    #[test]
    fn test_cover_sample_rect_full_frame_when_aspects_match() {
        let geometry = DisplayGeometry::new(
            (1920, 1080),
            DisplaySize {
                width: 640.0,
                height: 360.0,
            },
        );
        let rect = cover_sample_rect(&geometry);

        assert!((rect.x).abs() < 1e-9);
        assert!((rect.width - 1920.0).abs() < 1e-9);
    }
}
