//! Capture-to-words orchestration
//!
//! The interface the UI layer drives: start/stop the camera, take a still of
//! the current region, tune strategy and orientation, and read back the raw,
//! cropped, and processed images plus the segmented words of the last
//! capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::capture::{CaptureSession, SessionControls};
use crate::config::{AppConfig, BinarizeStrategy};
use crate::error::{ScanError, ScanResult};
use crate::segment::{surface_forms, Morpheme, Segmenter};
use crate::vision::preprocess::{preprocess, Applied};
use crate::vision::{crop_frame, Orientation, RecognizerRegistry, RegionOfInterest, NO_CROP_SCALE};

/// Everything produced by the most recent capture
#[derive(Debug, Clone, Default)]
pub struct LastCapture {
    /// Still of the displayed video, PNG-encoded
    pub raw_png: Vec<u8>,
    /// Region crop prior to binarization (the "original-cropped" preview)
    pub cropped_png: Vec<u8>,
    /// Binarized image handed to recognition
    pub processed_png: Vec<u8>,
    /// Morphemes per recognized line
    pub lines: Vec<Vec<Morpheme>>,
    /// Flat ordered word sequence across all lines
    pub words: Vec<String>,
}

/// Clears the processing flag on every exit path, including early errors
struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl ProcessingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> ScanResult<Self> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScanError::Busy);
        }
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// One user-facing scan pipeline over a capture session
pub struct Scanner {
    session: CaptureSession,
    registry: RecognizerRegistry,
    segmenter: Segmenter,
    config: AppConfig,
    orientation: Orientation,
    region: Option<RegionOfInterest>,
    processing: Arc<AtomicBool>,
    last: Arc<RwLock<LastCapture>>,
}

impl Scanner {
    pub fn new(
        session: CaptureSession,
        registry: RecognizerRegistry,
        segmenter: Segmenter,
        config: AppConfig,
    ) -> Self {
        Self {
            session,
            registry,
            segmenter,
            config,
            orientation: Orientation::default(),
            region: None,
            processing: Arc::new(AtomicBool::new(false)),
            last: Arc::new(RwLock::new(LastCapture::default())),
        }
    }

    /// Start the capture session for a viewport
    pub async fn start(&mut self, viewport: (f64, f64)) -> ScanResult<()> {
        self.session.start(viewport).await
    }

    /// Stop the capture session; a no-op when idle
    pub fn stop(&mut self) {
        self.session.stop();
    }

    /// Recompute the video layout after a viewport change
    pub fn resize(&mut self, viewport: (f64, f64)) {
        self.session.resize(viewport);
    }

    /// Begin loading both recognition engines and the analyzer concurrently
    ///
    /// Optional: first use initializes them anyway, this just front-loads the
    /// cost while the user is still framing the shot.
    pub async fn warm_up(&self) -> ScanResult<()> {
        let (horizontal, vertical, analyzer) = tokio::join!(
            self.registry.engine(Orientation::Horizontal),
            self.registry.engine(Orientation::Vertical),
            self.segmenter.wait_ready(),
        );
        horizontal?;
        vertical?;
        analyzer
    }

    /// Select the region of interest, in display coordinates
    pub fn set_region(&mut self, region: Option<RegionOfInterest>) {
        self.region = region;
    }

    pub fn region(&self) -> Option<RegionOfInterest> {
        self.region
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn strategy(&self) -> BinarizeStrategy {
        self.config.preprocess.strategy
    }

    pub fn set_strategy(&mut self, strategy: BinarizeStrategy) {
        self.config.preprocess.strategy = strategy;
    }

    /// Negotiated camera control descriptors
    pub fn controls(&self) -> &SessionControls {
        self.session.controls()
    }

    /// Apply a zoom value; failures stay local to the session
    pub fn set_zoom(&mut self, value: f64) -> bool {
        self.session.set_zoom(value)
    }

    /// Apply an exposure compensation value; failures stay local
    pub fn set_exposure(&mut self, value: f64) -> bool {
        self.session.set_exposure(value)
    }

    /// Whether a capture is currently being processed
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Results of the most recent capture
    pub fn last_capture(&self) -> LastCapture {
        self.last.read().clone()
    }

    /// Capture the current region and run it through to segmented words
    ///
    /// A second call while one is in flight is rejected with
    /// [`ScanError::Busy`]; engine calls are not cancellable, so requests are
    /// never interleaved.
    pub async fn take_photo(&mut self) -> ScanResult<Vec<String>> {
        let _processing = ProcessingGuard::acquire(&self.processing)?;

        // The display-to-native scale is read at freeze time: it is only
        // valid for the frame geometry the user was looking at.
        let geometry = self.session.geometry()?;
        let box_scale = geometry.scale();
        self.session.pause();

        // Give the caller a beat to show its loading state before the heavy
        // work freezes the feed.
        tokio::time::sleep(Duration::from_millis(self.config.capture.freeze_delay_ms)).await;

        let still = self.session.grab_still().await?;
        let raw_png = still.to_png()?;

        let (cropped, crop_scale) = match self.region {
            Some(region) => (crop_frame(&still, &region, box_scale)?, box_scale),
            None => (
                crop_frame(&still, &RegionOfInterest::default(), NO_CROP_SCALE)?,
                NO_CROP_SCALE,
            ),
        };
        let cropped_png = cropped.to_png()?;
        info!(
            "Captured {}x{} still, crop {}x{} (scale {:.3})",
            still.width(),
            still.height(),
            cropped.width(),
            cropped.height(),
            crop_scale,
        );

        let outcome = preprocess(&cropped, &self.config.preprocess);
        if let Applied::Fallback { reason } = &outcome.applied {
            warn!("Recognizing the un-cleaned crop: {}", reason);
        }
        let processed_png = outcome.frame.to_png()?;

        let line_texts = self
            .registry
            .recognize_lines(&outcome.frame, self.orientation)
            .await?;

        self.segmenter.wait_ready().await?;
        let lines = self.segmenter.segment_lines(&line_texts)?;
        let words: Vec<String> = lines.iter().flat_map(|line| surface_forms(line)).collect();
        info!(
            "Recognized {} line(s), {} word(s)",
            lines.len(),
            words.len()
        );

        *self.last.write() = LastCapture {
            raw_png,
            cropped_png,
            processed_png,
            lines,
            words: words.clone(),
        };

        Ok(words)
    }
}
