//! Logging setup for the console host.
//!
//! `RUST_LOG` wins when set; otherwise `-q` selects errors only and each `-v`
//! raises the level from info to debug to trace. Logs go to stderr so stdout
//! stays a clean stream of JSON events.

use env_logger::{Builder, Target};
use log::LevelFilter;

pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();
    builder.target(Target::Stderr);

    if std::env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.init();
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
