/// Counters for debugging scan sessions.
///
/// Stop failures and frame misses are deliberately not errors; they are only
/// counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub handles_opened: u64,
    pub handles_released: u64,
    pub start_failures: u64,
    pub stop_failures: u64,
    /// Handles that stopped on their own while scanning.
    pub capture_failures: u64,
    pub frames_missed: u64,
    pub decodes: u64,
    pub stale_decodes: u64,
}

impl SessionDiagnostics {
    /// Handles opened and not yet released. Never more than one.
    pub fn open_handles(&self) -> u64 {
        self.handles_opened - self.handles_released
    }
}
