//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for persisted state and the outbox
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Set the administrator address that receives forwarded texts
    SetAdmin {
        /// Destination address, e.g. +15551234567
        address: String,
    },
    /// Set the bearer credential sent to the relay endpoint
    SetCredential {
        /// API token
        token: String,
    },
    /// Remove the relay credential
    ClearCredential,
    /// Show the persisted relay configuration
    ShowConfig,
    /// Print the device identifier, creating it if needed
    DeviceId,
    /// Dispatch a single inbound message and wait for both sinks
    Dispatch {
        /// Original sender address
        #[arg(short, long)]
        sender: String,
        /// Message body
        #[arg(short, long)]
        body: String,
        /// Receive time in milliseconds since the epoch; defaults to now
        #[arg(short, long)]
        timestamp: Option<u64>,
    },
    /// Run a single heartbeat tick and print its outcome
    Heartbeat,
    /// Relay messages read as JSON lines from stdin until EOF or Ctrl-C
    Run {
        /// Do not run the periodic heartbeat
        #[arg(long)]
        no_heartbeat: bool,
    },
    /// Print an example configuration file
    ExampleConfig,
}
