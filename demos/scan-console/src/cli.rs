use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use scan_session_core::ScanConfiguration;

/// Scan barcodes and QR codes from a V4L2 camera.
///
/// Commands on stdin: `r` retry / scan again, `s` switch camera, `x` stop, `q` quit.
#[derive(Debug, Parser)]
#[command(name = "scan-console", version, about)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all logging except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// JSON scan configuration (`fps`, `decodeRegion`, `aspectRatio`)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the configured frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Requested frame width
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// Requested frame height, used when no aspect ratio is configured
    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// video4linux sysfs class directory
    #[arg(long, default_value = "/sys/class/video4linux")]
    pub sysfs_root: PathBuf,

    /// Directory holding the videoN device nodes
    #[arg(long, default_value = "/dev")]
    pub device_root: PathBuf,
}

impl Cli {
    /// Configuration from `--config` (or defaults) with CLI overrides applied.
    pub fn scan_configuration(&self) -> anyhow::Result<ScanConfiguration> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<ScanConfiguration>(&json)
                    .with_context(|| format!("invalid scan configuration in {}", path.display()))?
            }
            None => ScanConfiguration::default(),
        };
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        Ok(config)
    }
}
