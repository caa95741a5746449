//! Image preprocessing for OCR
//!
//! Reduces a cropped still to a binarized image: luminance conversion, a
//! brightness/contrast adjustment, then one of two selectable thresholding
//! strategies. The choice is always the caller's; nothing here tries to
//! guess which strategy fits the lighting.
//!
//! If any step fails the pipeline falls back to the unmodified input (a
//! usable, un-cleaned image beats aborting recognition) and the outcome is
//! tagged so callers can tell the difference.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::{box_filter, gaussian_blur_f32, median_filter};
use tracing::{debug, warn};

use crate::capture::frame::Frame;
use crate::config::{BinarizeStrategy, PreprocessSettings};
use crate::error::{ScanError, ScanResult};

/// Whether preprocessing ran or fell back to the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The selected strategy ran to completion
    Processed,
    /// A step failed; the frame is the unmodified input
    Fallback { reason: String },
}

/// Preprocessing result: always a usable frame, tagged with how it was made
#[derive(Debug, Clone)]
pub struct PreprocessOutcome {
    pub frame: Frame,
    pub applied: Applied,
}

/// Binarize a frame for recognition
pub fn preprocess(frame: &Frame, settings: &PreprocessSettings) -> PreprocessOutcome {
    match run_pipeline(frame, settings) {
        Ok(processed) => PreprocessOutcome {
            frame: processed,
            applied: Applied::Processed,
        },
        Err(e) => {
            warn!("Preprocessing failed, falling back to the raw crop: {}", e);
            PreprocessOutcome {
                frame: frame.clone(),
                applied: Applied::Fallback {
                    reason: e.to_string(),
                },
            }
        }
    }
}

fn run_pipeline(frame: &Frame, settings: &PreprocessSettings) -> ScanResult<Frame> {
    let gray = to_adjusted_luma(frame, settings.contrast, settings.brightness);

    let binary = match settings.strategy {
        BinarizeStrategy::Standard => binarize_adaptive(&gray, settings)?,
        BinarizeStrategy::Otsu => binarize_otsu(&gray),
    };

    debug!(
        "Binarized {}x{} frame with {:?}",
        frame.width(),
        frame.height(),
        settings.strategy
    );

    Ok(gray_to_frame(&binary))
}

/// Reduce RGBA to single-channel luminance and apply brightness/contrast
///
/// Luminance uses the perceptual weights 0.299 R + 0.587 G + 0.114 B; the
/// adjustment is `(px - 128) * contrast + 128 + brightness`, applied around
/// the midpoint so contrast stretches rather than shifts.
fn to_adjusted_luma(frame: &Frame, contrast: f32, brightness: f32) -> GrayImage {
    let (width, height) = frame.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (chunk, pixel) in frame.data().chunks_exact(4).zip(gray.pixels_mut()) {
        let luma =
            0.299 * chunk[0] as f32 + 0.587 * chunk[1] as f32 + 0.114 * chunk[2] as f32;
        let adjusted = ((luma - 128.0) * contrast + 128.0 + brightness).clamp(0.0, 255.0);
        *pixel = Luma([adjusted as u8]);
    }

    gray
}

/// Gaussian smoothing, median smoothing, then adaptive mean thresholding
///
/// A pixel survives when it exceeds the mean of its neighborhood block minus
/// a constant offset; the local mean tracks uneven lighting across the page.
fn binarize_adaptive(gray: &GrayImage, settings: &PreprocessSettings) -> ScanResult<GrayImage> {
    let gaussian_sigma = kernel_sigma(validate_kernel("gaussian_kernel", settings.gaussian_kernel)?);
    let median_radius = validate_kernel("median_kernel", settings.median_kernel)? / 2;
    let block_radius = validate_kernel("block_size", settings.block_size)? / 2;

    let smoothed = gaussian_blur_f32(gray, gaussian_sigma);
    let smoothed = median_filter(&smoothed, median_radius, median_radius);
    let local_mean = box_filter(&smoothed, block_radius, block_radius);

    let mut binary = GrayImage::new(gray.width(), gray.height());
    for ((out, px), mean) in binary
        .pixels_mut()
        .zip(smoothed.pixels())
        .zip(local_mean.pixels())
    {
        let cutoff = mean.0[0] as f32 - settings.offset;
        *out = Luma([if px.0[0] as f32 > cutoff { 255 } else { 0 }]);
    }

    Ok(binary)
}

/// Global binarization with the threshold chosen by Otsu's method
fn binarize_otsu(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    threshold(gray, level, ThresholdType::Binary)
}

fn validate_kernel(name: &str, size: u32) -> ScanResult<u32> {
    if size < 3 || size % 2 == 0 {
        return Err(ScanError::Capture(format!(
            "{name} must be odd and >= 3, got {size}"
        )));
    }
    Ok(size)
}

/// Sigma for a Gaussian kernel of the given size, per the usual
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8` rule.
fn kernel_sigma(size: u32) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gray_to_frame(gray: &GrayImage) -> Frame {
    let (width, height) = gray.dimensions();
    let mut rgba = RgbaImage::new(width, height);
    for (src, dst) in gray.pixels().zip(rgba.pixels_mut()) {
        let level = src.0[0];
        dst.0 = [level, level, level, 255];
    }
    Frame::from_rgba(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::testing::uniform_frame;

    fn settings(strategy: BinarizeStrategy) -> PreprocessSettings {
        PreprocessSettings {
            strategy,
            ..Default::default()
        }
    }

    fn black_pixel_count(frame: &Frame) -> usize {
        frame.data().chunks_exact(4).filter(|px| px[0] == 0).count()
    }

    #[test]
    fn test_otsu_keeps_all_white_image_white() {
        let frame = uniform_frame(20, 20, 255);
        let outcome = preprocess(&frame, &settings(BinarizeStrategy::Otsu));

        assert_eq!(outcome.applied, Applied::Processed);
        assert_eq!(black_pixel_count(&outcome.frame), 0);
    }

    #[test]
    fn test_otsu_is_idempotent_on_binary_input() {
        // Left half dark, right half light
        let mut data = Vec::new();
        for _y in 0..16 {
            for x in 0..16u32 {
                let level = if x < 8 { 40 } else { 220 };
                data.extend_from_slice(&[level, level, level, 255]);
            }
        }
        let frame = Frame::new(data, 16, 16).unwrap();

        let once = preprocess(&frame, &settings(BinarizeStrategy::Otsu));
        let twice = preprocess(&once.frame, &settings(BinarizeStrategy::Otsu));

        assert_eq!(once.applied, Applied::Processed);
        assert_eq!(once.frame, twice.frame);
    }

    #[test]
    fn test_output_is_strictly_two_level() {
        let mut data = Vec::new();
        for y in 0..32u32 {
            for x in 0..32u32 {
                let level = ((x * 8 + y * 3) % 256) as u8;
                data.extend_from_slice(&[level, level, level, 255]);
            }
        }
        let frame = Frame::new(data, 32, 32).unwrap();

        for strategy in [BinarizeStrategy::Standard, BinarizeStrategy::Otsu] {
            let outcome = preprocess(&frame, &settings(strategy));
            assert_eq!(outcome.applied, Applied::Processed);
            assert!(outcome
                .frame
                .data()
                .chunks_exact(4)
                .all(|px| px[0] == 0 || px[0] == 255));
        }
    }

    #[test]
    fn test_standard_keeps_text_on_gradient_background() {
        // Background brightness ramps across the image with a dark glyph
        // block in each half; a global threshold would lose one of them.
        let mut data = Vec::new();
        for y in 0..24u32 {
            for x in 0..48u32 {
                let background = 120 + (x * 2) as u8;
                let in_glyph = (6..10).contains(&x) || (38..42).contains(&x);
                let level = if in_glyph && (8..16).contains(&y) {
                    background.saturating_sub(90)
                } else {
                    background
                };
                data.extend_from_slice(&[level, level, level, 255]);
            }
        }
        let frame = Frame::new(data, 48, 24).unwrap();

        let outcome = preprocess(&frame, &settings(BinarizeStrategy::Standard));
        assert_eq!(outcome.applied, Applied::Processed);

        // Both glyph blocks survive as black pixels
        let rgba = outcome.frame.to_rgba();
        assert_eq!(rgba.get_pixel(8, 12).0[0], 0);
        assert_eq!(rgba.get_pixel(40, 12).0[0], 0);
    }

    #[test]
    fn test_invalid_kernel_falls_back_to_input() {
        let frame = uniform_frame(8, 8, 100);
        let mut bad = settings(BinarizeStrategy::Standard);
        bad.gaussian_kernel = 4;

        let outcome = preprocess(&frame, &bad);
        assert!(matches!(outcome.applied, Applied::Fallback { .. }));
        assert_eq!(outcome.frame, frame);
    }
}
