//! Error taxonomy for the scan pipeline
//!
//! Fatal errors abort the current operation and carry the name of the failing
//! stage. Recoverable failures (capability tweaks, preprocessing fallbacks,
//! per-line segmentation) are absorbed at their component boundary and only
//! logged; they never appear here.

use thiserror::Error;

use crate::vision::crop::PixelRect;

/// Fatal, stage-annotated pipeline errors
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No matching camera device")]
    NoDevice,

    #[error("Stream did not start: {0}")]
    StreamNotStarted(String),

    #[error("Video source is not connected to an active stream")]
    NotConnected,

    #[error("A capture session is already running")]
    AlreadyRunning,

    #[error("A capture is already being processed")]
    Busy,

    #[error("Crop rectangle {region:?} exceeds frame bounds {width}x{height}")]
    RegionOutOfBounds {
        region: PixelRect,
        width: u32,
        height: u32,
    },

    #[error("Morphological analyzer queried before it signalled readiness")]
    AnalyzerNotReady,

    #[error("Frame capture failed: {0}")]
    Capture(String),

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Result alias used throughout the pipeline
pub type ScanResult<T> = Result<T, ScanError>;
