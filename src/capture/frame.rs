//! Raster frame produced and consumed by the pipeline stages
//!
//! Every stage returns a *new* `Frame`; earlier frames stay valid so the raw
//! still can be displayed next to the cropped and binarized variants.

use std::io::Cursor;

use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{ScanError, ScanResult};

/// An owned RGBA raster image
///
/// The pixel buffer is immutable once the frame is constructed; transforming
/// stages read it and allocate a fresh frame for their output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Create a frame from raw RGBA pixel data
    ///
    /// The buffer length must be exactly `width * height * 4`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> ScanResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ScanError::Capture(format!(
                "pixel buffer is {} bytes, expected {} for {}x{} RGBA",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Create a frame from a decoded RGBA image buffer
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
        }
    }

    /// Decode a PNG (or any supported encoded image) into a frame
    pub fn from_encoded(bytes: &[u8]) -> ScanResult<Self> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_rgba(image.to_rgba8()))
    }

    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw RGBA pixel data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// View of the frame as an `image` crate buffer (copies the pixels)
    pub fn to_rgba(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("frame buffer length is validated at construction")
    }

    /// Encode the frame as PNG bytes
    pub fn to_png(&self) -> ScanResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(self.to_rgba()).write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Encode the frame as a `data:image/png;base64,...` URL
    pub fn to_data_url(&self) -> ScanResult<String> {
        let png = self.to_png()?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);
        Ok(format!("data:image/png;base64,{encoded}"))
    }

    /// Copy a sub-rectangle into a new frame
    ///
    /// The rectangle must already be validated against the frame bounds;
    /// callers own that policy (clamping for the cover fit, strict rejection
    /// for user crops).
    pub(crate) fn sub_rect(&self, x: u32, y: u32, width: u32, height: u32) -> Frame {
        debug_assert!(x + width <= self.width && y + height <= self.height);

        let mut region = Vec::with_capacity(width as usize * height as usize * 4);
        for row in y..(y + height) {
            let start = ((row * self.width + x) * 4) as usize;
            let end = start + (width * 4) as usize;
            region.extend_from_slice(&self.data[start..end]);
        }

        Frame {
            data: region,
            width,
            height,
        }
    }
}
