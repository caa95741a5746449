//! Webcam video source backed by nokhwa
//!
//! Maps the device stack onto the [`VideoSource`] contract: highest-available
//! resolution stream, decoded RGBA frames, and camera controls translated to
//! bounded descriptors.

use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    CameraIndex, ControlValueDescription, ControlValueSetter, KnownCameraControl,
    RequestedFormat, RequestedFormatType,
};
use nokhwa::Camera;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::frame::Frame;
use super::layout::DisplaySize;
use super::{
    CameraControl, ControlRange, DeviceCapabilities, FocusMode, StreamRequest, VideoSource,
};
use crate::error::{ScanError, ScanResult};

/// A physical camera as seen through nokhwa
pub struct NokhwaSource {
    index: u32,
    camera: Option<Camera>,
    display: DisplaySize,
    paused: bool,
    last_frame: Option<Frame>,
}

impl NokhwaSource {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            camera: None,
            display: DisplaySize {
                width: 0.0,
                height: 0.0,
            },
            paused: false,
            last_frame: None,
        }
    }

    fn camera_mut(&mut self) -> ScanResult<&mut Camera> {
        self.camera.as_mut().ok_or(ScanError::NotConnected)
    }

    fn control_range(&mut self, control: KnownCameraControl) -> Option<ControlRange> {
        let camera = self.camera.as_mut()?;
        let descriptor = camera.camera_control(control).ok()?;
        range_from_description(&descriptor.description().clone())
    }
}

#[async_trait(?Send)]
impl VideoSource for NokhwaSource {
    async fn start(&mut self, request: &StreamRequest) -> ScanResult<()> {
        // The device picks its largest mode no greater than the hint; the
        // request carries the "as high as possible" intent.
        debug!(
            "Opening camera {} (hint {}x{})",
            self.index, request.ideal_width, request.ideal_height
        );
        let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let mut camera = Camera::new(CameraIndex::Index(self.index), format).map_err(|e| {
            warn!("Opening camera {} failed: {}", self.index, e);
            ScanError::NoDevice
        })?;

        camera
            .open_stream()
            .map_err(|e| ScanError::StreamNotStarted(e.to_string()))?;

        let resolution = camera.resolution();
        info!(
            "Camera {} streaming at {}x{}",
            self.index,
            resolution.width(),
            resolution.height()
        );
        self.display = DisplaySize {
            width: resolution.width() as f64,
            height: resolution.height() as f64,
        };
        self.camera = Some(camera);
        self.paused = false;
        self.last_frame = None;
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.camera.is_some()
    }

    fn native_size(&self) -> (u32, u32) {
        self.camera
            .as_ref()
            .map(|camera| {
                let resolution = camera.resolution();
                (resolution.width(), resolution.height())
            })
            .unwrap_or((0, 0))
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
        if self.paused {
            if let Some(frame) = &self.last_frame {
                return Ok(frame.clone());
            }
        }

        let camera = self.camera_mut()?;
        let buffer = camera
            .frame()
            .map_err(|e| ScanError::Capture(format!("reading camera frame failed: {e}")))?;
        let decoded = buffer
            .decode_image::<RgbAFormat>()
            .map_err(|e| ScanError::Capture(format!("decoding camera frame failed: {e}")))?;

        let frame = Frame::from_rgba(decoded);
        self.last_frame = Some(frame.clone());
        Ok(frame)
    }

    fn capabilities(&mut self) -> DeviceCapabilities {
        let focus_modes = if self
            .camera
            .as_mut()
            .and_then(|camera| camera.camera_control(KnownCameraControl::Focus).ok())
            .is_some()
        {
            vec![FocusMode::SingleShot]
        } else {
            Vec::new()
        };

        DeviceCapabilities {
            zoom: self.control_range(KnownCameraControl::Zoom),
            exposure: self.control_range(KnownCameraControl::Exposure),
            focus_modes,
        }
    }

    fn apply_control(&mut self, control: CameraControl) -> ScanResult<()> {
        let (known, value) = match control {
            CameraControl::Zoom(value) => (KnownCameraControl::Zoom, value),
            CameraControl::Exposure(value) => (KnownCameraControl::Exposure, value),
            CameraControl::Focus(_) => {
                // One-shot focus maps to re-asserting the control's default
                let camera = self.camera_mut()?;
                let descriptor = camera
                    .camera_control(KnownCameraControl::Focus)
                    .map_err(|e| ScanError::Capture(format!("focus control query failed: {e}")))?;
                let description = descriptor.description().clone();
                let setter = default_setter(&description).ok_or_else(|| {
                    ScanError::Capture("focus control is not adjustable".into())
                })?;
                return camera
                    .set_camera_control(KnownCameraControl::Focus, setter)
                    .map_err(|e| ScanError::Capture(format!("applying focus failed: {e}")));
            }
        };

        let camera = self.camera_mut()?;
        let descriptor = camera
            .camera_control(known)
            .map_err(|e| ScanError::Capture(format!("{known:?} control query failed: {e}")))?;
        let setter = value_setter(&descriptor.description().clone(), value).ok_or_else(|| {
            ScanError::Capture(format!("{known:?} does not accept numeric values"))
        })?;
        camera
            .set_camera_control(known, setter)
            .map_err(|e| ScanError::Capture(format!("applying {known:?} failed: {e}")))
    }

    fn stop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                warn!("Stopping camera stream failed: {}", e);
            }
        }
        self.paused = false;
        self.last_frame = None;
    }
}

fn range_from_description(description: &ControlValueDescription) -> Option<ControlRange> {
    match description {
        ControlValueDescription::IntegerRange {
            min,
            max,
            value,
            step,
            ..
        } => Some(ControlRange {
            min: *min as f64,
            max: *max as f64,
            step: *step as f64,
            current: *value as f64,
        }),
        ControlValueDescription::FloatRange {
            min,
            max,
            value,
            step,
            ..
        } => Some(ControlRange {
            min: *min,
            max: *max,
            step: *step,
            current: *value,
        }),
        _ => None,
    }
}

fn value_setter(description: &ControlValueDescription, value: f64) -> Option<ControlValueSetter> {
    match description {
        ControlValueDescription::IntegerRange { .. } => {
            Some(ControlValueSetter::Integer(value.round() as i64))
        }
        ControlValueDescription::FloatRange { .. } => Some(ControlValueSetter::Float(value)),
        _ => None,
    }
}

fn default_setter(description: &ControlValueDescription) -> Option<ControlValueSetter> {
    match description {
        ControlValueDescription::IntegerRange { default, .. } => {
            Some(ControlValueSetter::Integer(*default))
        }
        ControlValueDescription::FloatRange { default, .. } => {
            Some(ControlValueSetter::Float(*default))
        }
        _ => None,
    }
}
