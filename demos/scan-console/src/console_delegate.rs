use std::io::Write;

use parking_lot::Mutex;
use serde::Serialize;

use scan_session_core::{DecodeResult, ScanDelegate, ScanError, SessionState};

/// Events printed to stdout, one JSON object per line.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ConsoleEvent {
    State {
        state: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        device_id: Option<String>,
    },
    Result {
        id: String,
        text: String,
        device_id: String,
        decoded_at: String,
    },
    Error {
        message: String,
        retry: bool,
    },
}

/// ScanDelegate that renders session events as JSON lines.
pub struct ConsoleDelegate<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleDelegate<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, event: ConsoleEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                log::error!("failed to serialize console event: {}", e);
                return;
            }
        };
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            log::error!("failed to write console event: {}", e);
        }
    }
}

impl<W: Write + Send> ScanDelegate for ConsoleDelegate<W> {
    fn on_state_changed(&self, state: &SessionState) {
        self.emit(ConsoleEvent::State {
            state: state.name().to_string(),
            device_id: state.device_id().map(str::to_string),
        });
    }

    fn on_result(&self, result: &DecodeResult) {
        self.emit(ConsoleEvent::Result {
            id: result.id.to_string(),
            text: result.text.clone(),
            device_id: result.device_id.clone(),
            decoded_at: result.decoded_at.to_rfc3339(),
        });
    }

    fn on_error(&self, error: &ScanError) {
        self.emit(ConsoleEvent::Error {
            message: error.to_string(),
            retry: true,
        });
    }
}
