//! QR decoding of greyscale frames with `rqrr`.

use scan_session_core::DecodeRegion;

use crate::frame::{Frame, FrameDecoder};

/// Decodes the first readable QR code inside the frame's decode region.
#[derive(Debug, Clone, Default)]
pub struct QrFrameDecoder;

impl QrFrameDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Pixel window `(x, y, width, height)` centered in the frame, clamped to it.
fn crop_window(width: u32, height: u32, region: Option<DecodeRegion>) -> (usize, usize, usize, usize) {
    let (w, h) = (width as usize, height as usize);
    match region {
        Some(region) => {
            let rw = (region.width as usize).min(w);
            let rh = (region.height as usize).min(h);
            ((w - rw) / 2, (h - rh) / 2, rw, rh)
        }
        None => (0, 0, w, h),
    }
}

impl FrameDecoder for QrFrameDecoder {
    fn decode(&mut self, frame: &Frame) -> Option<String> {
        let stride = frame.width as usize;
        if stride == 0 || frame.data.len() < stride * frame.height as usize {
            return None;
        }

        let (x0, y0, w, h) = crop_window(frame.width, frame.height, frame.decode_region);
        if w == 0 || h == 0 {
            return None;
        }

        let mut image = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| {
            frame.data[(y0 + y) * stride + x0 + x]
        });
        image
            .detect_grids()
            .into_iter()
            .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
    }
}
