//! Camera Capture Layer
//!
//! Owns the live video source and device capability negotiation. The actual
//! device is reached through the [`VideoSource`] trait so the pipeline depends
//! on raw frames and narrow capability descriptors, never on a concrete
//! camera stack.

pub mod extract;
pub mod frame;
pub mod layout;

#[cfg(feature = "camera")]
pub mod device;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::CaptureSettings;
use crate::error::{ScanError, ScanResult};
use frame::Frame;
use layout::{layout_display_size, DisplayGeometry, DisplaySize};

/// Camera facing preference for the stream request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera, pointed away from the user
    Environment,
    /// Front camera
    User,
}

/// Constraints passed to the device when opening a stream
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub facing: FacingMode,
    /// Resolution hint; the device picks the highest mode it can satisfy
    pub ideal_width: u32,
    pub ideal_height: u32,
}

/// Device-reported range for a tunable camera parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub current: f64,
}

impl ControlRange {
    /// Whether a requested value falls inside the reported range
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Focus modes a device track may support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    Continuous,
    SingleShot,
    Manual,
}

/// Capability set reported by the active video track
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    pub zoom: Option<ControlRange>,
    pub exposure: Option<ControlRange>,
    pub focus_modes: Vec<FocusMode>,
}

/// A constraint application against the active track
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraControl {
    Zoom(f64),
    Exposure(f64),
    Focus(FocusMode),
}

/// A live video device as the pipeline sees it
///
/// Implementations: the nokhwa webcam backend (feature `camera`) and scripted
/// test doubles. Not `Send`: device handles stay on the thread that opened
/// them, and the session runs on the main task.
#[async_trait(?Send)]
pub trait VideoSource {
    /// Open the stream and begin playback; returns only once frames flow
    async fn start(&mut self, request: &StreamRequest) -> ScanResult<()>;

    /// Whether the source is attached to an active stream
    fn is_live(&self) -> bool;

    /// Native sensor dimensions of the active stream
    fn native_size(&self) -> (u32, u32);

    /// Current on-screen size of the video, in display pixels
    fn display_size(&self) -> DisplaySize;

    /// Record a new on-screen size after a layout pass
    fn set_display_size(&mut self, size: DisplaySize);

    /// Freeze playback; subsequent frames repeat the last decoded one
    fn pause(&mut self);

    /// Wait for the next display-refresh opportunity and return the most
    /// recently decoded frame. On a paused source this returns the frozen
    /// frame, bit-identical across calls.
    async fn next_frame(&mut self) -> ScanResult<Frame>;

    /// Capability set of the active video track
    fn capabilities(&mut self) -> DeviceCapabilities;

    /// Apply a constraint to the active track
    fn apply_control(&mut self, control: CameraControl) -> ScanResult<()>;

    /// Stop every track and detach the source
    fn stop(&mut self);
}

/// Bounded control descriptors negotiated for the current session
#[derive(Debug, Clone, Default)]
pub struct SessionControls {
    /// Zoom descriptor, `None` when the track does not support zoom
    pub zoom: Option<ControlRange>,
    /// Exposure compensation descriptor, `None` when unsupported
    pub exposure: Option<ControlRange>,
    /// Whether one-shot focus was applied at negotiation time
    pub focus_applied: bool,
}

/// One live capture session: a started stream plus its negotiated controls
///
/// Exactly one session may be active; `start` on a live session fails with
/// [`ScanError::AlreadyRunning`] rather than silently replacing the stream.
pub struct CaptureSession {
    source: Box<dyn VideoSource>,
    settings: CaptureSettings,
    controls: SessionControls,
    live: bool,
}

impl CaptureSession {
    pub fn new(source: Box<dyn VideoSource>, settings: CaptureSettings) -> Self {
        Self {
            source,
            settings,
            controls: SessionControls::default(),
            live: false,
        }
    }

    /// Start the stream, settle, lay out the video, and negotiate controls
    ///
    /// Layout is recomputed only after a short settle delay: dimension
    /// queries issued immediately after stream-bind are unreliable.
    pub async fn start(&mut self, viewport: (f64, f64)) -> ScanResult<()> {
        if self.live {
            return Err(ScanError::AlreadyRunning);
        }

        let request = StreamRequest {
            facing: FacingMode::Environment,
            ideal_width: self.settings.ideal_width,
            ideal_height: self.settings.ideal_height,
        };
        self.source.start(&request).await?;
        self.live = true;

        let (width, height) = self.source.native_size();
        info!("Capture stream started at {}x{}", width, height);

        tokio::time::sleep(Duration::from_millis(self.settings.settle_delay_ms)).await;
        self.resize(viewport);

        self.init_controls();
        Ok(())
    }

    /// Recompute the on-screen video rectangle for a viewport
    pub fn resize(&mut self, viewport: (f64, f64)) {
        if !self.live {
            return;
        }
        let (native_width, native_height) = self.source.native_size();
        let size = layout_display_size(native_width, native_height, viewport.0, viewport.1);
        debug!(
            "Video laid out at {:.0}x{:.0} for viewport {:.0}x{:.0}",
            size.width, size.height, viewport.0, viewport.1
        );
        self.source.set_display_size(size);
    }

    /// Inspect the track capabilities and build bounded control descriptors
    ///
    /// Control failures are logged and swallowed; a failed capability tweak
    /// must never abort capture.
    fn init_controls(&mut self) {
        let capabilities = self.source.capabilities();

        self.controls.zoom = capabilities.zoom;
        if self.controls.zoom.is_none() {
            debug!("Zoom not supported by the active track");
        }

        self.controls.exposure = capabilities.exposure;
        if self.controls.exposure.is_none() {
            debug!("Exposure compensation not supported by the active track");
        }

        self.controls.focus_applied = if capabilities.focus_modes.contains(&FocusMode::SingleShot)
        {
            match self
                .source
                .apply_control(CameraControl::Focus(FocusMode::SingleShot))
            {
                Ok(()) => true,
                Err(e) => {
                    warn!("Applying one-shot focus failed: {}", e);
                    false
                }
            }
        } else {
            false
        };
    }

    /// Negotiated control descriptors for the current session
    pub fn controls(&self) -> &SessionControls {
        &self.controls
    }

    /// Apply a zoom value; out-of-range or unsupported requests fail locally.
    /// Returns whether the value was applied.
    pub fn set_zoom(&mut self, value: f64) -> bool {
        self.apply_ranged(CameraControl::Zoom(value), value)
    }

    /// Apply an exposure compensation value; failures stay local.
    pub fn set_exposure(&mut self, value: f64) -> bool {
        self.apply_ranged(CameraControl::Exposure(value), value)
    }

    fn apply_ranged(&mut self, control: CameraControl, value: f64) -> bool {
        let range = match control {
            CameraControl::Zoom(_) => self.controls.zoom,
            CameraControl::Exposure(_) => self.controls.exposure,
            CameraControl::Focus(_) => None,
        };
        let Some(range) = range else {
            warn!("{:?} rejected: control not supported", control);
            return false;
        };
        if !range.contains(value) {
            warn!(
                "{:?} rejected: outside [{}, {}]",
                control, range.min, range.max
            );
            return false;
        }
        match self.source.apply_control(control) {
            Ok(()) => {
                let slot = match control {
                    CameraControl::Zoom(_) => self.controls.zoom.as_mut(),
                    CameraControl::Exposure(_) => self.controls.exposure.as_mut(),
                    CameraControl::Focus(_) => None,
                };
                if let Some(descriptor) = slot {
                    descriptor.current = value;
                }
                true
            }
            Err(e) => {
                warn!("{:?} failed: {}", control, e);
                false
            }
        }
    }

    /// Whether a stream is currently bound and playing
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Display-to-native geometry of the current stream
    pub fn geometry(&self) -> ScanResult<DisplayGeometry> {
        if !self.live {
            return Err(ScanError::NotConnected);
        }
        Ok(DisplayGeometry::new(
            self.source.native_size(),
            self.source.display_size(),
        ))
    }

    /// Freeze playback before a still capture
    pub fn pause(&mut self) {
        self.source.pause();
    }

    /// Extract a still frame matching the displayed video
    pub async fn grab_still(&mut self) -> ScanResult<Frame> {
        extract::extract_still(self.source.as_mut()).await
    }

    /// Stop every track and detach the source; a no-op when idle
    pub fn stop(&mut self) {
        if !self.live {
            return;
        }
        self.source.stop();
        self.controls = SessionControls::default();
        self.live = false;
        info!("Capture session stopped");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Scripted video source for exercising the pipeline without a device
    pub(crate) struct ScriptedSource {
        pub native: (u32, u32),
        pub display: DisplaySize,
        pub frame: Frame,
        pub live: bool,
        pub paused: bool,
        pub fail_start: Option<ScanError>,
        pub frames_served: usize,
        pub capabilities: DeviceCapabilities,
    }

    impl ScriptedSource {
        pub fn new(native: (u32, u32), frame: Frame) -> Self {
            Self {
                native,
                display: DisplaySize {
                    width: native.0 as f64,
                    height: native.1 as f64,
                },
                frame,
                live: false,
                paused: false,
                fail_start: None,
                frames_served: 0,
                capabilities: DeviceCapabilities::default(),
            }
        }
    }

    #[async_trait(?Send)]
    impl VideoSource for ScriptedSource {
        async fn start(&mut self, _request: &StreamRequest) -> ScanResult<()> {
            if let Some(err) = self.fail_start.take() {
                return Err(err);
            }
            self.live = true;
            Ok(())
        }

        fn is_live(&self) -> bool {
            self.live
        }

        fn native_size(&self) -> (u32, u32) {
            self.native
        }

        fn display_size(&self) -> DisplaySize {
            self.display
        }

        fn set_display_size(&mut self, size: DisplaySize) {
            self.display = size;
        }

        fn pause(&mut self) {
            self.paused = true;
        }

        async fn next_frame(&mut self) -> ScanResult<Frame> {
            if !self.live {
                return Err(ScanError::NotConnected);
            }
            self.frames_served += 1;
            Ok(self.frame.clone())
        }

        fn capabilities(&mut self) -> DeviceCapabilities {
            self.capabilities.clone()
        }

        fn apply_control(&mut self, _control: CameraControl) -> ScanResult<()> {
            Ok(())
        }

        fn stop(&mut self) {
            self.live = false;
            self.paused = false;
        }
    }
}
