use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Area of the frame, in pixels, that the decoder inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeRegion {
    pub width: u32,
    pub height: u32,
}

/// Configuration passed to every capture handle a session opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfiguration {
    /// Frames handed to the decoder per second (default: 10).
    pub fps: u32,

    /// Decode region centered in the frame (default: 250x250). `None` scans the whole frame.
    pub decode_region: Option<DecodeRegion>,

    /// Requested width / height ratio of the preview (default: 1.0).
    pub aspect_ratio: Option<f64>,
}

impl ScanConfiguration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::ZeroFps);
        }
        if let Some(region) = self.decode_region {
            if region.width == 0 || region.height == 0 {
                return Err(ConfigError::EmptyDecodeRegion {
                    width: region.width,
                    height: region.height,
                });
            }
        }
        if let Some(ratio) = self.aspect_ratio {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(ConfigError::InvalidAspectRatio(ratio));
            }
        }
        Ok(())
    }

    /// Delay between two decoded frames.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}

impl Default for ScanConfiguration {
    fn default() -> Self {
        Self {
            fps: 10,
            decode_region: Some(DecodeRegion {
                width: 250,
                height: 250,
            }),
            aspect_ratio: Some(1.0),
        }
    }
}
