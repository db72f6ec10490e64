//! Camera device node access check.
//!
//! Linux has no consent prompt for cameras: access is governed by the
//! permissions on `/dev/videoN`, usually group `video`. Opening the node
//! read-only is enough to tell whether capture will be allowed.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use scan_session_core::DeviceError;

/// Check whether the current user may open the camera at `device_path`.
///
/// Returns `Ok(false)` when the node exists but access is denied, and an
/// error when the node does not exist.
pub fn check_camera_permission(device_path: &Path) -> Result<bool, DeviceError> {
    match File::open(device_path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Ok(false),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(DeviceError::Unavailable(format!(
            "{} does not exist",
            device_path.display()
        ))),
        Err(e) => {
            log::warn!("Unexpected error checking camera permission: {}", e);
            Err(DeviceError::from(e))
        }
    }
}
