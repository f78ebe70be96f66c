pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod server;
