use super::error::ScanError;

/// Scan session state machine.
///
/// State transitions:
/// ```text
/// idle → initializing → scanning ─→ idle   (decode, stop, switch)
///              ↓   ↑        │
///            error ┘ ←──────┘ (capture lost)
/// ```
///
/// `error` is left only through `initialize` (retry) or `stop`.
///
/// A capture handle is open if and only if the state is `Scanning`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Initializing,
    Scanning { device_id: String },
    Error(ScanError),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, Self::Scanning { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Device being scanned, if any.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::Scanning { device_id } => Some(device_id),
            _ => None,
        }
    }

    /// The user-visible message for the error state.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Error(err) => Some(err.to_string()),
            _ => None,
        }
    }

    /// Short lowercase name used in logs and host payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Scanning { .. } => "scanning",
            Self::Error(_) => "error",
        }
    }
}
