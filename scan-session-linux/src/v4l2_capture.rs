//! V4L2 frame capture provider.
//!
//! Streams from a `/dev/videoN` node through `v4l` on a dedicated thread and
//! hands frames to a `FrameDecoder`, throttled to the configured frame rate.
//! Decodes, misses and capture failures go to the session's `DecodeSink`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use scan_session_core::{
    CaptureHandle, CaptureProvider, DecodeSink, Device, DeviceError, ScanConfiguration,
};

use crate::frame::{Frame, FrameDecoder, FrameFormat};
use crate::v4l2_stream::{FrameSource, V4l2Stream};

/// Longest wait for a frame before the capture loop rechecks its running
/// flag; bounds how long `stop` can block on a stalled camera.
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Opens the frame source for a device on the capture thread.
pub(crate) type SourceOpener = fn(&Device, FrameFormat) -> Result<Box<dyn FrameSource>, DeviceError>;

/// Capture provider streaming frames from V4L2 device nodes.
///
/// `format` is the requested frame size; its height is reshaped by the
/// configured aspect ratio and the driver may settle on a nearby size.
/// Each handle gets its own clone of the decoder.
#[derive(Debug, Clone)]
pub struct V4l2CaptureProvider<D: FrameDecoder + Clone> {
    decoder: D,
    format: FrameFormat,
    open_source: SourceOpener,
}

impl<D: FrameDecoder + Clone> V4l2CaptureProvider<D> {
    pub fn new(decoder: D, format: FrameFormat) -> Self {
        Self {
            decoder,
            format,
            open_source: open_v4l2,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_source(decoder: D, format: FrameFormat, open_source: SourceOpener) -> Self {
        Self {
            decoder,
            format,
            open_source,
        }
    }
}

fn open_v4l2(device: &Device, format: FrameFormat) -> Result<Box<dyn FrameSource>, DeviceError> {
    let stream = V4l2Stream::open(Path::new(&device.id), format, POLL_TIMEOUT)?;
    Ok(Box::new(stream))
}

impl<D: FrameDecoder + Clone> CaptureProvider for V4l2CaptureProvider<D> {
    fn open_handle(
        &mut self,
        device: &Device,
        config: &ScanConfiguration,
        sink: DecodeSink,
    ) -> Result<Box<dyn CaptureHandle>, DeviceError> {
        let running = Arc::new(AtomicBool::new(true));
        let loop_running = Arc::clone(&running);
        let decoder = self.decoder.clone();
        let requested = self.format.with_aspect_ratio(config.aspect_ratio);
        let open_source = self.open_source;
        let config = config.clone();
        let device = device.clone();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        // The stream lives and dies on the capture thread; setup errors are
        // handed back so a failed open leaves nothing running.
        let handle = thread::Builder::new()
            .name("v4l2-capture".into())
            .spawn(move || {
                let source = match open_source(&device, requested) {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = capture_loop(source, &loop_running, decoder, &config, &sink) {
                    log::warn!("capture on {} ended: {}", device.id, e);
                    sink.failed(e);
                }
            })
            .map_err(|e| DeviceError::Io(format!("failed to spawn capture thread: {}", e)))?;

        let setup = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(DeviceError::Io("capture thread exited during setup".into())));
        if let Err(e) = setup {
            let _ = handle.join();
            return Err(e);
        }

        Ok(Box::new(V4l2Handle {
            running,
            capture_thread: Mutex::new(Some(handle)),
        }))
    }
}

/// Decodes frames until `running` is cleared. Returns an error when the
/// source fails; a stream never ends on its own while the device is healthy.
fn capture_loop<D: FrameDecoder>(
    mut source: Box<dyn FrameSource>,
    running: &AtomicBool,
    mut decoder: D,
    config: &ScanConfiguration,
    sink: &DecodeSink,
) -> Result<(), DeviceError> {
    let interval = config.frame_interval();
    let format = source.format();
    let mut frame = Frame {
        data: Vec::with_capacity(format.frame_size()),
        width: format.width,
        height: format.height,
        decode_region: config.decode_region,
    };

    while running.load(Ordering::SeqCst) {
        let frame_start = Instant::now();

        if !source.next_frame(&mut frame.data)? {
            continue;
        }

        match decoder.decode(&frame) {
            Some(text) => sink.decoded(text),
            None => sink.frame_missed(),
        }

        if let Some(remaining) = interval.checked_sub(frame_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    Ok(())
}

/// Streaming capture on one device node.
struct V4l2Handle {
    running: Arc<AtomicBool>,
    capture_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CaptureHandle for V4l2Handle {
    fn stop(&mut self) -> Result<(), DeviceError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.lock().take() {
            handle
                .join()
                .map_err(|_| DeviceError::Io("capture thread panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for V4l2Handle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
