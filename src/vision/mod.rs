//! Vision Layer
//!
//! Turns a captured still into recognized text: region crop, binarization,
//! and orientation-aware OCR with cached engine instances.

pub mod crop;
pub mod ocr;
pub mod preprocess;
pub mod tesseract;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use crop::{crop_frame, PixelRect, RegionOfInterest, NO_CROP_SCALE};
pub use ocr::{RecognizerRegistry, TextRecognizer};
pub use preprocess::{preprocess, Applied, PreprocessOutcome};

/// Layout direction of the text being recognized
///
/// Selects which cached engine instance handles the image; the vertical
/// instance is configured with a vertical-script language profile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Left-to-right lines
    #[default]
    Horizontal,
    /// Top-to-bottom columns
    Vertical,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        })
    }
}
