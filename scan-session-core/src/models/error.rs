use thiserror::Error;

/// User-facing scan errors.
///
/// These never escape a lifecycle call as a failure of the call itself: the
/// session records them in `SessionState::Error` and reports them to the
/// delegate, which offers a retry. `SessionClosed` and `CalledFromCallback`
/// are the exceptions: they are returned by the call and never become a state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("no camera found")]
    NoDeviceFound,

    #[error("permission denied / unavailable")]
    PermissionDenied,

    #[error("failed to start camera")]
    StartFailure,

    #[error("scan session closed")]
    SessionClosed,

    #[error("lifecycle call from inside a scan session callback")]
    CalledFromCallback,
}

impl From<&DeviceError> for ScanError {
    /// Maps a capture failure; access errors keep their meaning, anything
    /// else is a failure to run the camera.
    fn from(err: &DeviceError) -> Self {
        match err {
            DeviceError::PermissionDenied => Self::PermissionDenied,
            DeviceError::Unavailable(_) | DeviceError::Io(_) => Self::StartFailure,
        }
    }
}

/// Errors raised by platform device and capture backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            std::io::ErrorKind::NotFound => Self::Unavailable(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Rejected `ScanConfiguration`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("fps must be positive")]
    ZeroFps,

    #[error("decode region must be non-empty, got {width}x{height}")]
    EmptyDecodeRegion { width: u32, height: u32 },

    #[error("aspect ratio must be a positive number, got {0}")]
    InvalidAspectRatio(f64),
}

/// Failure to create a `ScanSession`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid scan configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn session worker: {0}")]
    Spawn(String),
}
