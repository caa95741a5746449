//! yomicam - point a camera at Japanese text and read it back as words
//!
//! The pipeline runs in strict order: a capture session owns the live video
//! source, a still is extracted to match the displayed geometry, the selected
//! region is cropped in capture-native pixels, binarized, recognized by an
//! orientation-tuned OCR engine, and finally segmented into words by a
//! morphological analyzer.
//!
//! [`scanner::Scanner`] is the surface a UI drives; everything below it
//! depends only on raw image buffers, narrow capability descriptors, and the
//! engine traits.

pub mod capture;
pub mod config;
pub mod error;
pub mod scanner;
pub mod segment;
pub mod vision;

pub use error::{ScanError, ScanResult};
pub use scanner::{LastCapture, Scanner};
