use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::models::config::ScanConfiguration;
use crate::models::device::Device;
use crate::models::diagnostics::SessionDiagnostics;
use crate::models::error::ScanError;
use crate::models::scan_result::DecodeResult;
use crate::models::state::SessionState;
use crate::traits::capture_provider::{CaptureHandle, CaptureProvider, DecodeEvent, DecodeSink};
use crate::traits::device_provider::DeviceProvider;
use crate::traits::scan_delegate::ScanDelegate;

/// Lifecycle requests sent by `ScanSession`. Each carries a reply channel
/// that is signalled once the operation has fully completed.
pub(crate) enum Command {
    Initialize(Sender<()>),
    Start(Device, Sender<()>),
    SwitchDevice(Sender<()>),
    Stop(Sender<()>),
    SetDelegate(Arc<dyn ScanDelegate>, Sender<()>),
    Shutdown(Sender<()>),
}

/// Read-only view published after every transition.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub state: SessionState,
    pub devices: Vec<Device>,
    pub current: usize,
    pub has_handle: bool,
}

/// State readable from any thread without going through the worker.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub snapshot: RwLock<Snapshot>,
    pub diagnostics: Mutex<SessionDiagnostics>,
    pub frames_missed: Arc<AtomicU64>,
}

impl Shared {
    pub fn diagnostics(&self) -> SessionDiagnostics {
        let mut diagnostics = *self.diagnostics.lock();
        diagnostics.frames_missed = self.frames_missed.load(Ordering::Relaxed);
        diagnostics
    }
}

struct ActiveHandle {
    generation: u64,
    device: Device,
    handle: Box<dyn CaptureHandle>,
}

/// Owns all mutable session state. Runs on the `scan-session` thread; every
/// transition happens here, one at a time.
pub(crate) struct Worker {
    devices: Box<dyn DeviceProvider>,
    capture: Box<dyn CaptureProvider>,
    config: ScanConfiguration,
    delegate: Option<Arc<dyn ScanDelegate>>,
    shared: Arc<Shared>,

    state: SessionState,
    device_list: Vec<Device>,
    current: usize,
    active: Option<ActiveHandle>,
    next_generation: u64,

    decode_tx: Sender<DecodeEvent>,
    decode_rx: Receiver<DecodeEvent>,
}

impl Worker {
    pub fn new(
        devices: Box<dyn DeviceProvider>,
        capture: Box<dyn CaptureProvider>,
        config: ScanConfiguration,
        shared: Arc<Shared>,
    ) -> Self {
        let (decode_tx, decode_rx) = crossbeam_channel::unbounded();
        Self {
            devices,
            capture,
            config,
            delegate: None,
            shared,
            state: SessionState::Idle,
            device_list: Vec::new(),
            current: 0,
            active: None,
            next_generation: 0,
            decode_tx,
            decode_rx,
        }
    }

    pub fn run(mut self, commands: Receiver<Command>) {
        let decode_rx = self.decode_rx.clone();
        loop {
            let keep_running = select! {
                recv(commands) -> msg => {
                    // Decodes reported before this command was sent are handled first.
                    while let Ok(event) = decode_rx.try_recv() {
                        self.on_handle_event(event);
                    }
                    match msg {
                        Ok(command) => self.handle_command(command),
                        Err(_) => {
                            // Every session handle is gone; release the camera anyway.
                            self.stop();
                            false
                        }
                    }
                }
                recv(decode_rx) -> event => {
                    if let Ok(event) = event {
                        self.on_handle_event(event);
                    }
                    true
                }
            };
            if !keep_running {
                break;
            }
        }
        log::debug!("scan session worker exited");
    }

    /// Run one lifecycle command and acknowledge it. Returns false on shutdown.
    fn handle_command(&mut self, command: Command) -> bool {
        let (reply, keep_running) = match command {
            Command::Initialize(reply) => {
                self.initialize();
                (reply, true)
            }
            Command::Start(device, reply) => {
                self.start(device);
                (reply, true)
            }
            Command::SwitchDevice(reply) => {
                self.switch_device();
                (reply, true)
            }
            Command::Stop(reply) => {
                self.stop();
                (reply, true)
            }
            Command::SetDelegate(delegate, reply) => {
                self.delegate = Some(delegate);
                (reply, true)
            }
            Command::Shutdown(reply) => {
                self.stop();
                (reply, false)
            }
        };
        let _ = reply.send(());
        keep_running
    }

    fn initialize(&mut self) {
        if self.release_handle() {
            self.set_state(SessionState::Idle);
        }
        self.set_state(SessionState::Initializing);

        match self.devices.list_devices() {
            Ok(devices) if devices.is_empty() => {
                log::warn!("camera enumeration returned no devices");
                self.device_list.clear();
                self.current = 0;
                self.set_state(SessionState::Error(ScanError::NoDeviceFound));
            }
            Ok(devices) => {
                log::info!("found {} camera(s)", devices.len());
                self.device_list = devices;
                self.current = 0;
                let first = self.device_list[0].clone();
                self.start(first);
            }
            Err(e) => {
                log::warn!("camera enumeration failed: {}", e);
                self.device_list.clear();
                self.current = 0;
                self.set_state(SessionState::Error(ScanError::PermissionDenied));
            }
        }
    }

    fn start(&mut self, device: Device) {
        if self.state.is_error() {
            log::debug!("start on {} ignored: session is in error, initialize to retry", device.id);
            return;
        }
        if self.release_handle() {
            self.set_state(SessionState::Idle);
        }
        if let Some(index) = self.device_list.iter().position(|d| d.id == device.id) {
            self.current = index;
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let sink = DecodeSink::new(
            generation,
            self.decode_tx.clone(),
            Arc::clone(&self.shared.frames_missed),
        );

        match self.capture.open_handle(&device, &self.config, sink) {
            Ok(handle) => {
                self.shared.diagnostics.lock().handles_opened += 1;
                log::info!("scanning on {} ({})", device.display_name(), device.id);
                let device_id = device.id.clone();
                self.active = Some(ActiveHandle {
                    generation,
                    device,
                    handle,
                });
                self.set_state(SessionState::Scanning { device_id });
            }
            Err(e) => {
                self.shared.diagnostics.lock().start_failures += 1;
                log::warn!("failed to start camera {}: {}", device.id, e);
                self.set_state(SessionState::Error(ScanError::from(&e)));
            }
        }
    }

    fn switch_device(&mut self) {
        if self.state.is_error() {
            log::debug!("switch ignored: session is in error, initialize to retry");
            return;
        }
        let count = self.device_list.len();
        if count < 2 {
            log::debug!("switch ignored: {} camera(s) enumerated", count);
            return;
        }
        let next = (self.current + 1) % count;
        let device = self.device_list[next].clone();
        self.start(device);
    }

    fn stop(&mut self) {
        self.release_handle();
        self.set_state(SessionState::Idle);
    }

    /// Stop and drop the active handle. Returns whether one was open.
    ///
    /// Stop failures are not actionable: they are counted and logged at
    /// debug level only.
    fn release_handle(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };
        if let Err(e) = active.handle.stop() {
            self.shared.diagnostics.lock().stop_failures += 1;
            log::debug!("ignoring stop failure on {}: {}", active.device.id, e);
        }
        drop(active);
        self.shared.diagnostics.lock().handles_released += 1;
        true
    }

    fn on_handle_event(&mut self, event: DecodeEvent) {
        let device_id = match &self.active {
            Some(active) if active.generation == event.generation() => active.device.id.clone(),
            _ => {
                if matches!(event, DecodeEvent::Decoded { .. }) {
                    self.shared.diagnostics.lock().stale_decodes += 1;
                }
                log::trace!("dropping event from stale handle {}", event.generation());
                return;
            }
        };

        match event {
            DecodeEvent::Decoded { text, .. } => {
                self.shared.diagnostics.lock().decodes += 1;
                self.stop();

                let result = DecodeResult::new(text, device_id);
                log::info!("decoded {} on {} ({})", result.text, result.device_id, result.id);
                if let Some(delegate) = &self.delegate {
                    delegate.on_result(&result);
                }
            }
            DecodeEvent::Failed { error, .. } => {
                self.shared.diagnostics.lock().capture_failures += 1;
                log::warn!("capture on {} stopped: {}", device_id, error);
                self.release_handle();
                self.set_state(SessionState::Error(ScanError::from(&error)));
            }
        }
    }

    fn set_state(&mut self, new_state: SessionState) {
        if new_state.is_idle() && self.state.is_idle() {
            self.publish();
            return;
        }
        log::debug!("scan session: {} -> {}", self.state.name(), new_state.name());
        self.state = new_state;
        self.publish();

        if let Some(delegate) = &self.delegate {
            delegate.on_state_changed(&self.state);
            if let SessionState::Error(err) = &self.state {
                delegate.on_error(err);
            }
        }
    }

    fn publish(&self) {
        *self.shared.snapshot.write() = Snapshot {
            state: self.state.clone(),
            devices: self.device_list.clone(),
            current: self.current,
            has_handle: self.active.is_some(),
        };
    }
}
