//! CLI command definitions for the `pmassist` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod thread;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Product-manager chat assistant service.
#[derive(Parser)]
#[command(name = "pmassist", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config.toml (default: `<data dir>/config.toml`).
    #[arg(long, global = true, env = "PMASSIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST/SSE API server.
    Serve {
        /// Address to bind (default: `server.host` from config).
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: `server.port` from config).
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Create the data directory and database, and run migrations.
    Setup,

    /// List the threads of a user, most recent first.
    Threads {
        /// User id.
        user_id: String,

        /// Maximum number of threads.
        #[arg(long, default_value_t = 20)]
        limit: i64,

        /// Number of threads to skip.
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show the messages and PRD of a thread.
    History {
        /// Thread id.
        thread_id: String,

        /// Only show the thread if it belongs to this user.
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
