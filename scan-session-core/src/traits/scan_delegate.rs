use crate::models::error::ScanError;
use crate::models::scan_result::DecodeResult;
use crate::models::state::SessionState;

/// Event delegate for scan session notifications.
///
/// All methods are called from the session worker thread, not the UI thread.
/// Implementations should marshal to the UI thread if needed. Lifecycle
/// methods called on the same session from inside a callback return
/// `ScanError::CalledFromCallback` instead of running.
pub trait ScanDelegate: Send + Sync {
    /// Called after every state transition.
    fn on_state_changed(&self, state: &SessionState);

    /// Called once per successful decode, after the session has been torn down.
    fn on_result(&self, result: &DecodeResult);

    /// Called when the session enters the error state.
    fn on_error(&self, error: &ScanError);
}
