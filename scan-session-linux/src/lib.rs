//! # scan-session-linux
//!
//! Linux V4L2 backend for scan-session-core.
//!
//! Provides:
//! - `SysfsDeviceProvider`: Camera enumeration via `/sys/class/video4linux`
//! - `V4l2CaptureProvider`: Memory-mapped streaming from a `/dev/videoN` node (`v4l`), decoded by a `FrameDecoder`
//! - `QrFrameDecoder`: QR decoding of greyscale frames (portable)
//! - `permissions`: Camera device node access check
//!
//! ## Usage
//! ```ignore
//! use scan_session_core::{ScanConfiguration, ScanSession};
//! use scan_session_linux::{FrameFormat, QrFrameDecoder, SysfsDeviceProvider, V4l2CaptureProvider};
//!
//! let format = FrameFormat { width: 640, height: 480 };
//! let capture = V4l2CaptureProvider::new(QrFrameDecoder::new(), format);
//! let session = ScanSession::new(SysfsDeviceProvider::new(), capture, ScanConfiguration::default())?;
//! session.initialize()?;
//! ```

#[cfg(target_os = "linux")]
pub mod device_enumerator;
pub mod frame;
#[cfg(target_os = "linux")]
pub mod permissions;
pub mod qr_decoder;
#[cfg(target_os = "linux")]
pub mod v4l2_capture;
#[cfg(target_os = "linux")]
mod v4l2_stream;

#[cfg(target_os = "linux")]
pub use device_enumerator::SysfsDeviceProvider;
pub use frame::{Frame, FrameDecoder, FrameFormat};
pub use qr_decoder::QrFrameDecoder;
#[cfg(target_os = "linux")]
pub use v4l2_capture::V4l2CaptureProvider;
