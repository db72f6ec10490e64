pub mod scan_session;
mod worker;
