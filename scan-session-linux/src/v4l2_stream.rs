//! Memory-mapped V4L2 streaming with the `v4l` crate.
//!
//! UVC cameras only support streaming I/O, so frames are dequeued from
//! mmap buffers rather than read() from the node. The camera is asked for
//! `GREY` first and `YUYV` second; both carry a full-resolution luma plane,
//! which is all the decoders need.

use std::io;
use std::path::Path;
use std::time::Duration;

use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use scan_session_core::DeviceError;

use crate::frame::FrameFormat;

const BUFFER_COUNT: u32 = 4;

/// Where the capture loop gets its frames from.
pub(crate) trait FrameSource {
    /// Geometry of the frames `next_frame` produces.
    fn format(&self) -> FrameFormat;

    /// Replace `luma` with the next frame, one byte per pixel.
    ///
    /// Returns `Ok(false)` when no frame arrived within the poll timeout.
    fn next_frame(&mut self, luma: &mut Vec<u8>) -> Result<bool, DeviceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelLayout {
    /// 8-bit luma only.
    Grey,
    /// Packed 4:2:2, `Y0 U Y1 V`.
    Yuyv,
}

impl PixelLayout {
    fn fourcc(self) -> FourCC {
        match self {
            Self::Grey => FourCC::new(b"GREY"),
            Self::Yuyv => FourCC::new(b"YUYV"),
        }
    }

    fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Grey => 1,
            Self::Yuyv => 2,
        }
    }
}

/// A streaming V4L2 capture device.
pub(crate) struct V4l2Stream {
    stream: MmapStream<'static>,
    format: FrameFormat,
    stride: usize,
    layout: PixelLayout,
}

impl V4l2Stream {
    /// Open the node, negotiate a pixel format close to `requested` and
    /// start streaming. `timeout` bounds every wait for a frame.
    ///
    /// Sequence:
    /// 1. Open the device node
    /// 2. Set `GREY`, falling back to `YUYV`
    /// 3. Map the capture buffers and set the poll timeout
    pub(crate) fn open(path: &Path, requested: FrameFormat, timeout: Duration) -> Result<Self, DeviceError> {
        let device = Device::with_path(path)?;
        let (format, layout) = negotiate(&device, requested)?;

        let frame = FrameFormat {
            width: format.width,
            height: format.height,
        };
        let min_stride = frame.width as usize * layout.bytes_per_pixel();
        let stride = (format.stride as usize).max(min_stride);

        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;
        stream.set_timeout(timeout);

        log::info!(
            "streaming {} at {}x{} ({})",
            path.display(),
            frame.width,
            frame.height,
            format.fourcc
        );
        Ok(Self {
            stream,
            format: frame,
            stride,
            layout,
        })
    }
}

impl FrameSource for V4l2Stream {
    fn format(&self) -> FrameFormat {
        self.format
    }

    fn next_frame(&mut self, luma: &mut Vec<u8>) -> Result<bool, DeviceError> {
        let (buffer, meta) = match CaptureStream::next(&mut self.stream) {
            Ok(frame) => frame,
            Err(e) if is_retryable(&e) => return Ok(false),
            Err(e) => return Err(DeviceError::from(e)),
        };
        let used = (meta.bytesused as usize).min(buffer.len());
        if !extract_luma(&buffer[..used], self.format, self.stride, self.layout, luma) {
            log::trace!("short frame: {} bytes", used);
            return Ok(false);
        }
        Ok(true)
    }
}

fn is_retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn negotiate(device: &Device, requested: FrameFormat) -> Result<(Format, PixelLayout), DeviceError> {
    for layout in [PixelLayout::Grey, PixelLayout::Yuyv] {
        let wanted = Format::new(requested.width, requested.height, layout.fourcc());
        let actual = device.set_format(&wanted)?;
        if actual.fourcc.repr == wanted.fourcc.repr {
            return Ok((actual, layout));
        }
        log::debug!("camera refused {}, got {}", wanted.fourcc, actual.fourcc);
    }
    Err(DeviceError::Unavailable(
        "camera supports neither GREY nor YUYV".into(),
    ))
}

/// Copy the luma plane of a `GREY` or `YUYV` buffer into `luma`, dropping
/// row padding. Returns false when the buffer is shorter than one frame.
fn extract_luma(
    buffer: &[u8],
    format: FrameFormat,
    stride: usize,
    layout: PixelLayout,
    luma: &mut Vec<u8>,
) -> bool {
    let (width, height) = (format.width as usize, format.height as usize);
    let row_bytes = width * layout.bytes_per_pixel();
    if height == 0 || stride < row_bytes || buffer.len() < stride * (height - 1) + row_bytes {
        return false;
    }

    luma.clear();
    luma.reserve(width * height);
    for row in buffer.chunks(stride).take(height) {
        let row = &row[..row_bytes];
        match layout {
            PixelLayout::Grey => luma.extend_from_slice(row),
            PixelLayout::Yuyv => luma.extend(row.iter().step_by(2)),
        }
    }
    true
}
