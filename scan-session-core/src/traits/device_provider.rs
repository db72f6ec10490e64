use crate::models::device::Device;
use crate::models::error::DeviceError;

/// Platform capability that lists capture devices.
///
/// Implemented by:
/// - `SysfsDeviceProvider` (Linux)
/// - in-memory fakes in tests
pub trait DeviceProvider: Send + 'static {
    /// List the capture devices currently available, in platform order.
    ///
    /// Fails with `DeviceError::PermissionDenied` when camera access has not
    /// been granted.
    fn list_devices(&self) -> Result<Vec<Device>, DeviceError>;
}
