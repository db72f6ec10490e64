use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::models::config::ScanConfiguration;
use crate::models::device::Device;
use crate::models::error::DeviceError;

/// Event forwarded from a capture handle into the session worker.
#[derive(Debug)]
pub(crate) enum DecodeEvent {
    Decoded { generation: u64, text: String },
    Failed { generation: u64, error: DeviceError },
}

impl DecodeEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Decoded { generation, .. } | Self::Failed { generation, .. } => *generation,
        }
    }
}

/// Where a capture handle reports what it decoded.
///
/// Cloneable and callable from any thread; the platform's decode thread
/// owns one per handle. Calls never block and never touch session state
/// directly: decodes and failures are queued for the session worker, misses
/// only bump a counter.
#[derive(Debug, Clone)]
pub struct DecodeSink {
    generation: u64,
    tx: Sender<DecodeEvent>,
    frames_missed: Arc<AtomicU64>,
}

impl DecodeSink {
    pub(crate) fn new(generation: u64, tx: Sender<DecodeEvent>, frames_missed: Arc<AtomicU64>) -> Self {
        Self {
            generation,
            tx,
            frames_missed,
        }
    }

    /// A code was read from the current frame.
    pub fn decoded(&self, text: impl Into<String>) {
        // The session may already be gone; a late decode has nowhere to go.
        let _ = self.tx.send(DecodeEvent::Decoded {
            generation: self.generation,
            text: text.into(),
        });
    }

    /// Capture stopped on its own (stream ended, device unplugged, driver
    /// error). The session releases the handle and enters the error state.
    pub fn failed(&self, error: DeviceError) {
        let _ = self.tx.send(DecodeEvent::Failed {
            generation: self.generation,
            error,
        });
    }

    /// The current frame contained no readable code. Expected on most frames.
    pub fn frame_missed(&self) {
        self.frames_missed.fetch_add(1, Ordering::Relaxed);
    }
}

/// An open, streaming capture on one device.
///
/// Owned exclusively by the session; dropped right after `stop`.
pub trait CaptureHandle: Send {
    /// Stop streaming and release the device.
    ///
    /// After this returns no further calls are made on the handle's sink
    /// that the session will act on.
    fn stop(&mut self) -> Result<(), DeviceError>;
}

/// Platform capability that opens capture handles.
///
/// Implemented by:
/// - `V4l2CaptureProvider` (Linux)
/// - in-memory fakes in tests
pub trait CaptureProvider: Send + 'static {
    /// Open `device` and begin decoding with `config`, reporting to `sink`.
    ///
    /// On error nothing may be left open.
    fn open_handle(
        &mut self,
        device: &Device,
        config: &ScanConfiguration,
        sink: DecodeSink,
    ) -> Result<Box<dyn CaptureHandle>, DeviceError>;
}
