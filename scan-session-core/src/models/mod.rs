pub mod config;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod scan_result;
pub mod state;
