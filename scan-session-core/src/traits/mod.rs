pub mod capture_provider;
pub mod device_provider;
pub mod scan_delegate;
