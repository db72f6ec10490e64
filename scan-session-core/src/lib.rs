//! # scan-session-core
//!
//! Platform-agnostic camera scan session.
//!
//! Owns the lifecycle of a barcode / QR capture: enumerate cameras, start
//! decoding on one, switch between them, emit the first decoded payload and
//! tear the camera down. Platform backends implement `DeviceProvider` and
//! `CaptureProvider` and plug into the generic `ScanSession`.
//!
//! ## Architecture
//!
//! ```text
//! scan-session-core (this crate)
//! ├── traits/   ← DeviceProvider, CaptureProvider, CaptureHandle, DecodeSink, ScanDelegate
//! ├── models/   ← Device, SessionState, ScanError, ScanConfiguration, DecodeResult
//! └── session/  ← ScanSession (serialized state machine on its own worker thread)
//! ```

pub mod models;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{DecodeRegion, ScanConfiguration};
pub use models::device::Device;
pub use models::diagnostics::SessionDiagnostics;
pub use models::error::{ConfigError, DeviceError, ScanError, SessionError};
pub use models::scan_result::DecodeResult;
pub use models::state::SessionState;
pub use session::scan_session::ScanSession;
pub use traits::capture_provider::{CaptureHandle, CaptureProvider, DecodeSink};
pub use traits::device_provider::DeviceProvider;
pub use traits::scan_delegate::ScanDelegate;
