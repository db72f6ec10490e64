//! Greyscale frames and the decoder seam.

use scan_session_core::DecodeRegion;

/// Frame geometry of the luma plane handed to decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
}

impl FrameFormat {
    /// Bytes per frame, one per pixel.
    pub fn frame_size(&self) -> usize {
        (self.width as usize * self.height as usize).max(1)
    }

    /// Keep the width and derive the height from a width / height ratio.
    ///
    /// The driver picks the closest size it supports, so the result is a
    /// request rather than a guarantee.
    pub fn with_aspect_ratio(self, ratio: Option<f64>) -> Self {
        match ratio {
            Some(ratio) if ratio.is_finite() && ratio > 0.0 => Self {
                width: self.width,
                height: ((f64::from(self.width) / ratio).round() as u32).max(1),
            },
            _ => self,
        }
    }
}

/// One greyscale frame, row-major, one byte per pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Region the decoder should restrict itself to, if configured.
    pub decode_region: Option<DecodeRegion>,
}

/// Barcode / QR symbology decoder run against every captured frame.
pub trait FrameDecoder: Send + 'static {
    /// Return the payload when the frame contains a readable code.
    fn decode(&mut self, frame: &Frame) -> Option<String>;
}
