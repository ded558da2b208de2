//! # Sensorwatch CLI Module
//!
//! ## Available Commands
//!
//! - `watch` - Connect and print readings as a live table (default)
//! - `serve` - Start the HTTP API
//! - `init` - Write a config file
//! - `check` - Validate config and provider reachability

mod commands;

use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Sensorwatch - live sensor telemetry from a smart contract
///
/// Follows `DataRecorded(deviceId, temperature, humidity)` events and shows
/// one device's readings in arrival order.
#[derive(Parser, Debug)]
#[command(name = "sensorwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the config file (default: sensorwatch.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and print readings as they arrive
    Watch {
        /// Device to follow (overrides config)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Start the HTTP API
    Serve {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Start idle instead of connecting at startup
        #[arg(long)]
        idle: bool,
    },

    /// Write a config file
    Init {
        /// Deployed sensor contract address
        #[arg(short = 'a', long)]
        contract_address: String,

        /// JSON-RPC endpoint
        #[arg(short, long)]
        rpc_url: Option<String>,

        /// Device to follow
        #[arg(short, long)]
        device: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate config and provider reachability
    Check,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = cli.config.as_deref();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Watch { device }) => cmd_watch(config, device).await,
        Some(Commands::Serve { host, port, idle }) => cmd_serve(config, host, port, idle).await,
        Some(Commands::Init {
            contract_address,
            rpc_url,
            device,
            force,
        }) => cmd_init(config, contract_address, rpc_url, device, force, json_mode),
        Some(Commands::Check) => cmd_check(config, json_mode).await,
        None => cmd_watch(config, None).await,
    }
}
