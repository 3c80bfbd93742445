pub mod communication;
pub mod config;
pub mod device;
pub mod oracle;
pub mod session;
