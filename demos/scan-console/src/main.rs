mod cli;
mod console_delegate;
mod logging;

use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use scan_session_core::{ScanSession, SessionState};

use crate::cli::Cli;
use crate::console_delegate::ConsoleDelegate;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);
    run(&cli)
}

#[cfg(target_os = "linux")]
fn run(cli: &Cli) -> anyhow::Result<()> {
    use scan_session_linux::{FrameFormat, QrFrameDecoder, SysfsDeviceProvider, V4l2CaptureProvider};

    let config = cli.scan_configuration()?;
    let devices = SysfsDeviceProvider::with_roots(&cli.sysfs_root, &cli.device_root);
    let format = FrameFormat {
        width: cli.width,
        height: cli.height,
    };
    let capture = V4l2CaptureProvider::new(QrFrameDecoder::new(), format);

    let mut session = ScanSession::new(devices, capture, config).context("failed to create scan session")?;
    session
        .set_delegate(Arc::new(ConsoleDelegate::new(io::stdout())))
        .context("failed to attach console")?;

    session.initialize()?;
    print_devices(&session);

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        match line.trim() {
            "r" => session.initialize()?,
            "s" => session.switch_device()?,
            "x" => session.stop()?,
            "q" => break,
            "" => {}
            other => log::warn!("unknown command {:?} (r = retry, s = switch, x = stop, q = quit)", other),
        }
        if let SessionState::Error(_) = session.state() {
            log::info!("press r to retry");
        }
    }

    session.close()?;
    let diagnostics = session.diagnostics();
    log::debug!(
        "session closed: {} handle(s) opened, {} frame(s) without a code",
        diagnostics.handles_opened,
        diagnostics.frames_missed
    );
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run(_cli: &Cli) -> anyhow::Result<()> {
    anyhow::bail!("no camera backend for this platform")
}

#[cfg(target_os = "linux")]
fn print_devices(session: &ScanSession) {
    use std::path::Path;

    use scan_session_linux::permissions::check_camera_permission;

    for (index, device) in session.devices().iter().enumerate() {
        let marker = if index == session.current_index() { "*" } else { " " };
        log::info!("{} [{}] {} ({})", marker, index, device.display_name(), device.id);
        if let Ok(false) = check_camera_permission(Path::new(&device.id)) {
            log::warn!("no access to {}; is this user in the video group?", device.id);
        }
    }
}
