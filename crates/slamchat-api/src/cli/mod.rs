//! CLI definitions for the `slamchat` binary.

pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Real-time chat engine for pickup-basketball rooms.
#[derive(Parser)]
#[command(name = "slamchat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding `config.toml` and the SQLite database.
    #[arg(long, global = true, env = "SLAMCHAT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Redis URL for the message cache. Overrides `config.toml`.
    #[arg(long, global = true, env = "SLAMCHAT_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Output machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP/WebSocket server.
    Serve {
        /// Port to listen on. Defaults to `server.port` from config.
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to. Defaults to `server.host` from config.
        #[arg(long)]
        host: Option<String>,

        /// Export spans through the OpenTelemetry stdout exporter.
        #[arg(long)]
        otel: bool,
    },

    /// Show data directory, cache backend and store counts.
    Status,
}

impl Cli {
    /// Default log directives for the chosen verbosity.
    pub fn log_directives(&self) -> &'static str {
        match self.verbose {
            0 => "info,sqlx=warn",
            1 => "debug,sqlx=warn",
            _ => "trace",
        }
    }
}
