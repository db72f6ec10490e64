use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;

use super::worker::{Command, Shared, Worker};
use crate::models::config::ScanConfiguration;
use crate::models::device::Device;
use crate::models::diagnostics::SessionDiagnostics;
use crate::models::error::{ScanError, SessionError};
use crate::models::state::SessionState;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::device_provider::DeviceProvider;
use crate::traits::scan_delegate::ScanDelegate;

/// Camera scan session.
///
/// Owns at most one capture handle and drives it through
/// initialize → scan → decode → teardown:
/// ```text
/// [DeviceProvider] → devices ─┐
///                             ├→ [worker] → state / DecodeResult → [ScanDelegate]
/// [CaptureProvider] → handle ─┘      ↑
///                 decode sink ───────┘
/// ```
///
/// Lifecycle calls block until the worker has finished the operation, so
/// they are serialized even when issued from several threads. Device,
/// permission and start failures are not returned; they land in
/// `SessionState::Error` and are reported to the delegate.
pub struct ScanSession {
    commands: Option<Sender<Command>>,
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ScanSession {
    pub fn new<D, C>(devices: D, capture: C, config: ScanConfiguration) -> Result<Self, SessionError>
    where
        D: DeviceProvider,
        C: CaptureProvider,
    {
        config.validate()?;

        let shared = Arc::new(Shared::default());
        let worker = Worker::new(Box::new(devices), Box::new(capture), config, Arc::clone(&shared));
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = thread::Builder::new()
            .name("scan-session".into())
            .spawn(move || worker.run(rx))
            .map_err(|e| SessionError::Spawn(e.to_string()))?;

        Ok(Self {
            commands: Some(tx),
            shared,
            worker: Some(handle),
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn ScanDelegate>) -> Result<(), ScanError> {
        self.request(|reply| Command::SetDelegate(delegate, reply))
    }

    /// Enumerate cameras and start scanning on the first one.
    ///
    /// Also the retry path out of the error state.
    pub fn initialize(&self) -> Result<(), ScanError> {
        self.request(Command::Initialize)
    }

    /// Scan on `device`, releasing the current handle first. Ignored while
    /// the session is in the error state.
    pub fn start(&self, device: Device) -> Result<(), ScanError> {
        self.request(|reply| Command::Start(device, reply))
    }

    /// Move to the next enumerated camera, wrapping around. No-op with fewer
    /// than two, or while the session is in the error state.
    pub fn switch_device(&self) -> Result<(), ScanError> {
        self.request(Command::SwitchDevice)
    }

    /// Release the camera and return to idle. Safe to call in any state.
    ///
    /// Also clears the error state without retrying.
    pub fn stop(&self) -> Result<(), ScanError> {
        self.request(Command::Stop)
    }

    /// Stop scanning, wait for the camera to be released and shut the
    /// session down. Later lifecycle calls return `ScanError::SessionClosed`.
    pub fn close(&mut self) -> Result<(), ScanError> {
        let result = self.request(Command::Shutdown);
        self.commands = None;
        if let Some(handle) = self.worker.take() {
            if handle.thread().id() == thread::current().id() {
                // Last reference dropped inside a callback: the worker winds
                // down on its own once the mailbox disconnects.
                return result;
            }
            if handle.join().is_err() {
                log::error!("scan session worker panicked");
            }
        }
        result
    }

    pub fn state(&self) -> SessionState {
        self.shared.snapshot.read().state.clone()
    }

    pub fn devices(&self) -> Vec<Device> {
        self.shared.snapshot.read().devices.clone()
    }

    /// The selected camera, once at least one has been enumerated.
    pub fn current_device(&self) -> Option<Device> {
        let snapshot = self.shared.snapshot.read();
        snapshot.devices.get(snapshot.current).cloned()
    }

    pub fn current_index(&self) -> usize {
        self.shared.snapshot.read().current
    }

    pub fn error_message(&self) -> Option<String> {
        self.shared.snapshot.read().state.error_message()
    }

    pub fn has_active_handle(&self) -> bool {
        self.shared.snapshot.read().has_handle
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.shared.diagnostics()
    }

    pub fn is_closed(&self) -> bool {
        self.worker.is_none()
    }

    fn request(&self, make: impl FnOnce(Sender<()>) -> Command) -> Result<(), ScanError> {
        let commands = self.commands.as_ref().ok_or(ScanError::SessionClosed)?;
        // The worker would wait on itself for the reply.
        if self.on_worker_thread() {
            return Err(ScanError::CalledFromCallback);
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        commands
            .send(make(reply_tx))
            .map_err(|_| ScanError::SessionClosed)?;
        reply_rx.recv().map_err(|_| ScanError::SessionClosed)
    }

    fn on_worker_thread(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id())
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.close();
        }
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{OnceLock, Weak};
    use std::time::Duration;

    use crossbeam_channel::Receiver;
    use parking_lot::Mutex;
    use proptest::prelude::*;

    use super::*;
    use crate::models::error::DeviceError;
    use crate::models::scan_result::DecodeResult;
    use crate::traits::capture_provider::{CaptureHandle, DecodeSink};

    const TIMEOUT: Duration = Duration::from_secs(5);

    // --- Fakes ---

    struct FakeDevices {
        result: Result<Vec<Device>, DeviceError>,
    }

    impl FakeDevices {
        fn with(ids: &[&str]) -> Self {
            Self {
                result: Ok(ids.iter().map(|id| Device::new(*id, id.to_uppercase())).collect()),
            }
        }
    }

    impl DeviceProvider for FakeDevices {
        fn list_devices(&self) -> Result<Vec<Device>, DeviceError> {
            self.result.clone()
        }
    }

    #[derive(Default)]
    struct Camera {
        open: usize,
        max_open: usize,
        opened: Vec<String>,
        stopped: Vec<String>,
        sinks: Vec<DecodeSink>,
        fail_open: VecDeque<Option<DeviceError>>,
        fail_stop: bool,
    }

    #[derive(Clone, Default)]
    struct FakeCapture {
        camera: Arc<Mutex<Camera>>,
    }

    impl FakeCapture {
        fn last_sink(&self) -> DecodeSink {
            self.camera.lock().sinks.last().cloned().unwrap()
        }
    }

    struct FakeHandle {
        device_id: String,
        camera: Arc<Mutex<Camera>>,
    }

    impl CaptureHandle for FakeHandle {
        fn stop(&mut self) -> Result<(), DeviceError> {
            let mut camera = self.camera.lock();
            camera.open -= 1;
            camera.stopped.push(self.device_id.clone());
            if camera.fail_stop {
                Err(DeviceError::Io("stream already gone".into()))
            } else {
                Ok(())
            }
        }
    }

    impl CaptureProvider for FakeCapture {
        fn open_handle(
            &mut self,
            device: &Device,
            _config: &ScanConfiguration,
            sink: DecodeSink,
        ) -> Result<Box<dyn CaptureHandle>, DeviceError> {
            let mut camera = self.camera.lock();
            if let Some(err) = camera.fail_open.pop_front().flatten() {
                return Err(err);
            }
            camera.open += 1;
            camera.max_open = camera.max_open.max(camera.open);
            camera.opened.push(device.id.clone());
            camera.sinks.push(sink);
            Ok(Box::new(FakeHandle {
                device_id: device.id.clone(),
                camera: Arc::clone(&self.camera),
            }))
        }
    }

    #[derive(Debug)]
    enum Event {
        State(SessionState),
        Result(DecodeResult, bool, SessionState),
        Error(ScanError),
    }

    /// Records callbacks; for results also captures the session view at the
    /// moment the callback fires.
    struct RecordingDelegate {
        tx: Sender<Event>,
        shared: Mutex<Option<Arc<Shared>>>,
    }

    impl ScanDelegate for RecordingDelegate {
        fn on_state_changed(&self, state: &SessionState) {
            let _ = self.tx.send(Event::State(state.clone()));
        }

        fn on_result(&self, result: &DecodeResult) {
            let (has_handle, state) = match &*self.shared.lock() {
                Some(shared) => {
                    let snapshot = shared.snapshot.read();
                    (snapshot.has_handle, snapshot.state.clone())
                }
                None => (false, SessionState::Idle),
            };
            let _ = self.tx.send(Event::Result(result.clone(), has_handle, state));
        }

        fn on_error(&self, error: &ScanError) {
            let _ = self.tx.send(Event::Error(error.clone()));
        }
    }

    fn session_with(devices: FakeDevices, capture: FakeCapture) -> (ScanSession, Receiver<Event>) {
        let session = ScanSession::new(devices, capture, ScanConfiguration::default()).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let delegate = Arc::new(RecordingDelegate {
            tx,
            shared: Mutex::new(Some(Arc::clone(&session.shared))),
        });
        session.set_delegate(delegate).unwrap();
        (session, rx)
    }

    fn next_result(rx: &Receiver<Event>) -> (DecodeResult, bool, SessionState) {
        loop {
            match rx.recv_timeout(TIMEOUT).expect("no result delivered") {
                Event::Result(result, has_handle, state) => return (result, has_handle, state),
                _ => continue,
            }
        }
    }

    fn states(rx: &Receiver<Event>) -> Vec<SessionState> {
        rx.try_iter()
            .filter_map(|e| match e {
                Event::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    // --- Tests ---

    #[test]
    fn initialize_starts_first_device() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1", "cam2"]), capture.clone());

        session.initialize().unwrap();

        assert_eq!(
            session.state(),
            SessionState::Scanning {
                device_id: "cam1".into()
            }
        );
        assert!(session.has_active_handle());
        assert_eq!(session.devices().len(), 2);
        assert_eq!(session.current_device().unwrap().id, "cam1");
        assert_eq!(
            states(&rx),
            vec![
                SessionState::Initializing,
                SessionState::Scanning {
                    device_id: "cam1".into()
                },
            ]
        );
    }

    #[test]
    fn initialize_without_devices_reports_no_camera() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&[]), capture.clone());

        session.initialize().unwrap();

        assert_eq!(session.state(), SessionState::Error(ScanError::NoDeviceFound));
        assert!(session.error_message().unwrap().contains("no camera found"));
        assert!(!session.has_active_handle());
        assert!(capture.camera.lock().opened.is_empty());
        assert!(rx
            .try_iter()
            .any(|e| matches!(e, Event::Error(ScanError::NoDeviceFound))));
    }

    #[test]
    fn enumeration_failure_reports_permission_denied() {
        let devices = FakeDevices {
            result: Err(DeviceError::PermissionDenied),
        };
        let (session, _rx) = session_with(devices, FakeCapture::default());

        session.initialize().unwrap();

        assert_eq!(session.state(), SessionState::Error(ScanError::PermissionDenied));
        assert_eq!(
            session.error_message().as_deref(),
            Some("permission denied / unavailable")
        );
    }

    #[test]
    fn start_failure_leaves_no_handle_and_retry_recovers() {
        let capture = FakeCapture::default();
        capture
            .camera
            .lock()
            .fail_open
            .push_back(Some(DeviceError::Unavailable("cam1".into())));
        let (session, _rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());

        session.initialize().unwrap();
        assert_eq!(session.state(), SessionState::Error(ScanError::StartFailure));
        assert_eq!(session.error_message().as_deref(), Some("failed to start camera"));
        assert!(!session.has_active_handle());
        assert_eq!(capture.camera.lock().open, 0);

        session.initialize().unwrap();
        assert!(session.state().is_scanning());
        assert_eq!(capture.camera.lock().open, 1);
        assert_eq!(session.diagnostics().start_failures, 1);
    }

    #[test]
    fn access_denied_on_open_reports_permission_denied() {
        let capture = FakeCapture::default();
        capture
            .camera
            .lock()
            .fail_open
            .push_back(Some(DeviceError::PermissionDenied));
        let (session, rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());

        session.initialize().unwrap();

        assert_eq!(session.state(), SessionState::Error(ScanError::PermissionDenied));
        assert_eq!(
            session.error_message().as_deref(),
            Some("permission denied / unavailable")
        );
        assert!(!session.has_active_handle());
        assert!(rx
            .try_iter()
            .any(|e| matches!(e, Event::Error(ScanError::PermissionDenied))));
    }

    #[test]
    fn error_state_ignores_start_and_switch() {
        let capture = FakeCapture::default();
        capture
            .camera
            .lock()
            .fail_open
            .push_back(Some(DeviceError::Io("EBUSY".into())));
        let (session, rx) = session_with(FakeDevices::with(&["cam1", "cam2"]), capture.clone());

        session.initialize().unwrap();
        assert_eq!(session.state(), SessionState::Error(ScanError::StartFailure));
        let _ = states(&rx);

        session.switch_device().unwrap();
        session.start(Device::new("cam2", "CAM2")).unwrap();

        assert_eq!(session.state(), SessionState::Error(ScanError::StartFailure));
        assert!(!session.has_active_handle());
        assert_eq!(session.current_index(), 0);
        assert!(capture.camera.lock().opened.is_empty());
        assert!(states(&rx).is_empty());

        session.initialize().unwrap();
        assert_eq!(session.state().device_id(), Some("cam1"));
    }

    #[test]
    fn capture_failure_releases_handle_and_reports_error() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());
        session.initialize().unwrap();
        let sink = capture.last_sink();

        sink.failed(DeviceError::Unavailable("stream ended".into()));

        loop {
            match rx.recv_timeout(TIMEOUT).expect("no error reported") {
                Event::Error(err) => {
                    assert_eq!(err, ScanError::StartFailure);
                    break;
                }
                _ => continue,
            }
        }
        assert_eq!(session.state(), SessionState::Error(ScanError::StartFailure));
        assert!(!session.has_active_handle());
        assert_eq!(capture.camera.lock().open, 0);
        assert_eq!(capture.camera.lock().stopped, vec!["cam1"]);

        // Anything the dead handle still reports is ignored.
        sink.decoded("late");
        sink.failed(DeviceError::Io("EIO".into()));
        session.initialize().unwrap();
        assert!(session.state().is_scanning());
        assert!(!rx.try_iter().any(|e| matches!(e, Event::Result(..))));

        let diagnostics = session.diagnostics();
        assert_eq!(diagnostics.capture_failures, 1);
        assert_eq!(diagnostics.stale_decodes, 1);
        assert_eq!(diagnostics.open_handles(), 1);
    }

    #[test]
    fn stop_without_handle_is_noop() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());

        session.stop().unwrap();
        session.stop().unwrap();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.has_active_handle());
        assert!(capture.camera.lock().stopped.is_empty());
        assert!(states(&rx).is_empty());
    }

    #[test]
    fn stop_failure_is_swallowed() {
        let capture = FakeCapture::default();
        capture.camera.lock().fail_stop = true;
        let (session, _rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());

        session.initialize().unwrap();
        session.stop().unwrap();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.has_active_handle());
        assert_eq!(session.diagnostics().stop_failures, 1);
        assert_eq!(session.diagnostics().open_handles(), 0);
    }

    #[test]
    fn stop_from_error_returns_to_idle() {
        let (session, _rx) = session_with(FakeDevices::with(&[]), FakeCapture::default());

        session.initialize().unwrap();
        assert!(session.state().is_error());

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn switch_with_single_device_is_noop() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());
        session.initialize().unwrap();
        let _ = states(&rx);

        session.switch_device().unwrap();

        assert_eq!(
            session.state(),
            SessionState::Scanning {
                device_id: "cam1".into()
            }
        );
        let camera = capture.camera.lock();
        assert_eq!(camera.opened, vec!["cam1"]);
        assert!(camera.stopped.is_empty());
        drop(camera);
        assert!(states(&rx).is_empty());
    }

    #[test]
    fn switch_cycles_through_devices_in_order() {
        let capture = FakeCapture::default();
        let (session, _rx) = session_with(FakeDevices::with(&["a", "b", "c"]), capture.clone());
        session.initialize().unwrap();

        let mut indices = vec![session.current_index()];
        for _ in 0..6 {
            session.switch_device().unwrap();
            indices.push(session.current_index());
        }

        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2, 0]);
        let camera = capture.camera.lock();
        assert_eq!(camera.opened, vec!["a", "b", "c", "a", "b", "c", "a"]);
        assert_eq!(camera.max_open, 1);
    }

    #[test]
    fn start_selects_enumerated_device() {
        let capture = FakeCapture::default();
        let (session, _rx) = session_with(FakeDevices::with(&["a", "b", "c"]), capture.clone());
        session.initialize().unwrap();

        session.start(Device::new("c", "C")).unwrap();
        assert_eq!(session.current_index(), 2);

        session.switch_device().unwrap();
        assert_eq!(session.current_device().unwrap().id, "a");
        assert_eq!(capture.camera.lock().max_open, 1);
    }

    #[test]
    fn frame_misses_do_not_change_state() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());
        session.initialize().unwrap();
        let _ = states(&rx);

        let sink = capture.last_sink();
        for _ in 0..50 {
            sink.frame_missed();
        }
        // Round-trip through the worker so any queued event has been seen.
        session.switch_device().unwrap();

        assert!(session.state().is_scanning());
        assert!(session.has_active_handle());
        assert_eq!(session.diagnostics().frames_missed, 50);
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn decode_tears_down_before_result_callback() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());
        session.initialize().unwrap();

        capture.last_sink().decoded("4006381333931");

        let (result, has_handle, state) = next_result(&rx);
        assert_eq!(result.text, "4006381333931");
        assert_eq!(result.device_id, "cam1");
        assert!(!has_handle);
        assert_eq!(state, SessionState::Idle);
        assert_eq!(capture.camera.lock().open, 0);
    }

    #[test]
    fn only_first_decode_is_delivered() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());
        session.initialize().unwrap();

        let sink = capture.last_sink();
        sink.decoded("first");
        sink.decoded("second");

        let (result, _, _) = next_result(&rx);
        assert_eq!(result.text, "first");

        session.stop().unwrap();
        assert!(!rx.try_iter().any(|e| matches!(e, Event::Result(..))));
        let diagnostics = session.diagnostics();
        assert_eq!(diagnostics.decodes, 1);
        assert_eq!(diagnostics.stale_decodes, 1);
    }

    #[test]
    fn decode_from_replaced_handle_is_ignored() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1", "cam2"]), capture.clone());
        session.initialize().unwrap();
        let old_sink = capture.last_sink();

        session.switch_device().unwrap();
        old_sink.decoded("late");
        session.stop().unwrap();

        assert!(!rx.try_iter().any(|e| matches!(e, Event::Result(..))));
        assert_eq!(session.diagnostics().stale_decodes, 1);
    }

    #[test]
    fn decode_from_platform_thread() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());
        session.initialize().unwrap();

        let sink = capture.last_sink();
        let platform = thread::spawn(move || {
            for _ in 0..10 {
                sink.frame_missed();
            }
            sink.decoded("QR-PAYLOAD");
        });
        platform.join().unwrap();

        let (result, has_handle, _) = next_result(&rx);
        assert_eq!(result.text, "QR-PAYLOAD");
        assert!(!has_handle);
    }

    #[test]
    fn switch_then_decode_scenario() {
        let capture = FakeCapture::default();
        let (session, rx) = session_with(FakeDevices::with(&["cam1", "cam2"]), capture.clone());

        session.initialize().unwrap();
        assert_eq!(session.state().device_id(), Some("cam1"));

        session.switch_device().unwrap();
        assert_eq!(
            session.state(),
            SessionState::Scanning {
                device_id: "cam2".into()
            }
        );
        {
            let camera = capture.camera.lock();
            assert_eq!(camera.stopped, vec!["cam1"]);
            assert_eq!(camera.opened, vec!["cam1", "cam2"]);
            assert_eq!(camera.max_open, 1);
        }

        capture.last_sink().decoded("8901234567890");
        let (result, has_handle, state) = next_result(&rx);
        assert_eq!(result.text, "8901234567890");
        assert_eq!(result.device_id, "cam2");
        assert!(!has_handle);
        assert_eq!(state, SessionState::Idle);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(capture.camera.lock().open, 0);
    }

    #[test]
    fn close_releases_camera_and_rejects_further_calls() {
        let capture = FakeCapture::default();
        let (mut session, _rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());
        session.initialize().unwrap();

        session.close().unwrap();

        assert!(session.is_closed());
        assert_eq!(capture.camera.lock().open, 0);
        assert_eq!(session.initialize(), Err(ScanError::SessionClosed));
        assert_eq!(session.close(), Err(ScanError::SessionClosed));
    }

    #[test]
    fn drop_releases_camera() {
        let capture = FakeCapture::default();
        let (session, _rx) = session_with(FakeDevices::with(&["cam1"]), capture.clone());
        session.initialize().unwrap();

        drop(session);

        assert_eq!(capture.camera.lock().open, 0);
        assert_eq!(capture.camera.lock().stopped, vec!["cam1"]);
    }

    #[test]
    fn concurrent_callers_never_overlap_handles() {
        let capture = FakeCapture::default();
        let (session, _rx) =
            session_with(FakeDevices::with(&["a", "b", "c"]), capture.clone());
        let session = Arc::new(session);
        session.initialize().unwrap();

        let callers: Vec<_> = (0..4)
            .map(|i| {
                let session = Arc::clone(&session);
                thread::spawn(move || {
                    for _ in 0..25 {
                        match i % 2 {
                            0 => session.switch_device().unwrap(),
                            _ => session.initialize().unwrap(),
                        }
                    }
                })
            })
            .collect();
        for caller in callers {
            caller.join().unwrap();
        }

        assert_eq!(capture.camera.lock().max_open, 1);
        assert!(session.state().is_scanning());
        assert_eq!(session.diagnostics().open_handles(), 1);
    }

    /// Calls back into the session it is attached to.
    struct ReentrantDelegate {
        session: OnceLock<Weak<ScanSession>>,
        outcome: Mutex<Option<Result<(), ScanError>>>,
    }

    impl ScanDelegate for ReentrantDelegate {
        fn on_state_changed(&self, state: &SessionState) {
            if !state.is_scanning() {
                return;
            }
            if let Some(session) = self.session.get().and_then(Weak::upgrade) {
                *self.outcome.lock() = Some(session.stop());
            }
        }

        fn on_result(&self, _result: &DecodeResult) {}

        fn on_error(&self, _error: &ScanError) {}
    }

    #[test]
    fn lifecycle_call_from_callback_is_rejected() {
        let capture = FakeCapture::default();
        let session = Arc::new(
            ScanSession::new(
                FakeDevices::with(&["cam1"]),
                capture.clone(),
                ScanConfiguration::default(),
            )
            .unwrap(),
        );
        let delegate = Arc::new(ReentrantDelegate {
            session: OnceLock::new(),
            outcome: Mutex::new(None),
        });
        let _ = delegate.session.set(Arc::downgrade(&session));
        session.set_delegate(delegate.clone()).unwrap();

        session.initialize().unwrap();

        assert_eq!(*delegate.outcome.lock(), Some(Err(ScanError::CalledFromCallback)));
        assert!(session.state().is_scanning());
        session.stop().unwrap();
        assert_eq!(capture.camera.lock().open, 0);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = ScanConfiguration {
            fps: 0,
            ..Default::default()
        };
        let result = ScanSession::new(FakeDevices::with(&["cam1"]), FakeCapture::default(), config);
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Initialize,
        Start(usize),
        Switch,
        Stop,
        Decode,
        Fail,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Initialize),
            (0usize..3).prop_map(Op::Start),
            Just(Op::Switch),
            Just(Op::Stop),
            Just(Op::Decode),
            Just(Op::Fail),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn at_most_one_handle_open(ops in proptest::collection::vec(op(), 1..30)) {
            let capture = FakeCapture::default();
            let devices = ["a", "b", "c"];
            let session = ScanSession::new(
                FakeDevices::with(&devices),
                capture.clone(),
                ScanConfiguration::default(),
            )
            .unwrap();

            for op in ops {
                match op {
                    Op::Initialize => session.initialize().unwrap(),
                    Op::Start(i) => session.start(Device::new(devices[i], "")).unwrap(),
                    Op::Switch => session.switch_device().unwrap(),
                    Op::Stop => session.stop().unwrap(),
                    Op::Decode => {
                        if let Some(sink) = capture.camera.lock().sinks.last() {
                            sink.decoded("code");
                        }
                    }
                    Op::Fail => {
                        if let Some(sink) = capture.camera.lock().sinks.last() {
                            sink.failed(DeviceError::Io("EIO".into()));
                        }
                    }
                }
                prop_assert!(capture.camera.lock().open <= 1);
                let snapshot = session.shared.snapshot.read().clone();
                prop_assert_eq!(snapshot.has_handle, snapshot.state.is_scanning());
            }

            drop(session);
            let camera = capture.camera.lock();
            prop_assert!(camera.max_open <= 1);
            prop_assert_eq!(camera.open, 0);
        }
    }
}
