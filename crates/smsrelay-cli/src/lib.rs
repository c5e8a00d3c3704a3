//! SMS relay CLI library
//!
//! The administrative interface (admin address and credential setters) and a
//! reference host that feeds stdin messages into the relay runtime.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod ingest;

pub use app::RelayApp;
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
