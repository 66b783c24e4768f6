pub mod configuration;
pub mod container_management;
pub mod error_handling;
pub mod log_streaming;
