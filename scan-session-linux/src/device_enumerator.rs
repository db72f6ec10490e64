//! Camera enumeration via the video4linux sysfs class.
//!
//! Every V4L2 node appears as `/sys/class/video4linux/videoN` with a `name`
//! attribute. UVC cameras register several nodes per sensor (capture plus
//! metadata); only the node whose `index` attribute is 0 can stream frames,
//! so the others are skipped.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use scan_session_core::{Device, DeviceError, DeviceProvider};

const SYSFS_ROOT: &str = "/sys/class/video4linux";
const DEV_ROOT: &str = "/dev";

/// Lists cameras from sysfs; device ids are the `/dev/videoN` paths.
#[derive(Debug, Clone)]
pub struct SysfsDeviceProvider {
    sysfs_root: PathBuf,
    dev_root: PathBuf,
}

impl SysfsDeviceProvider {
    pub fn new() -> Self {
        Self::with_roots(SYSFS_ROOT, DEV_ROOT)
    }

    /// Enumerate from alternative roots (containers, tests).
    pub fn with_roots(sysfs_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            dev_root: dev_root.into(),
        }
    }

    fn read_attribute(node: &Path, attribute: &str) -> Option<String> {
        fs::read_to_string(node.join(attribute))
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Whether the node is the streaming interface of its device.
    fn is_capture_node(node: &Path) -> bool {
        match Self::read_attribute(node, "index") {
            Some(index) => index.parse::<u32>().map(|i| i == 0).unwrap_or(true),
            None => true,
        }
    }
}

impl Default for SysfsDeviceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceProvider for SysfsDeviceProvider {
    fn list_devices(&self) -> Result<Vec<Device>, DeviceError> {
        let entries = match fs::read_dir(&self.sysfs_root) {
            Ok(entries) => entries,
            // No V4L2 driver loaded: no cameras rather than a failure.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DeviceError::from(e)),
        };

        let mut nodes: Vec<(u32, Device)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(DeviceError::from)?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(number) = name.strip_prefix("video").and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };

            let node = entry.path();
            if !Self::is_capture_node(&node) {
                log::debug!("skipping non-capture node {}", name);
                continue;
            }

            let label = Self::read_attribute(&node, "name").unwrap_or_default();
            let id = self.dev_root.join(name).to_string_lossy().into_owned();
            nodes.push((number, Device { id, label }));
        }

        nodes.sort_by_key(|(number, _)| *number);
        Ok(nodes.into_iter().map(|(_, device)| device).collect())
    }
}
