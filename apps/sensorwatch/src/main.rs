//! # Sensorwatch - Live Sensor Telemetry
//!
//! Follows `DataRecorded` events from a sensor contract and shows one
//! device's readings as a terminal table or over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Write a config for a deployed contract
//! sensorwatch init -a 0x5fbdb2315678afecb367f032d93f642f64180aa3
//!
//! # Follow readings in the terminal
//! sensorwatch watch --device sensor-1
//!
//! # Serve the HTTP API
//! sensorwatch serve --port 8080
//! ```

use clap::Parser;
use sensorwatch::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // SENSORWATCH_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("SENSORWATCH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sensorwatch=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        let code = if e.is_fatal_config() { 1 } else { 2 };
        std::process::exit(code);
    }
}

/// Print the Sensorwatch startup banner.
fn print_banner() {
    println!(
        r#"
  sensorwatch v{}
  live telemetry from DataRecorded events
"#,
        env!("CARGO_PKG_VERSION")
    );
}
