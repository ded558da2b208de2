//! # CLI Command Implementations

use crate::api::{self, AppState};
use crate::config::{AppConfig, RuntimeConfig, config_path, write_config};
use crate::error::AppError;
use crate::manager::LifecycleManager;
use crate::provider::CapabilityProvider;
use crate::render::TableRenderer;
use crate::rpc::RpcProvider;
use sensorwatch_core::LifecycleState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Pause between connect attempts in `watch`.
const CONNECT_RETRY: Duration = Duration::from_secs(5);

// =============================================================================
// SHARED SETUP
// =============================================================================

/// Load, override and validate the configuration.
fn load_runtime(
    config: Option<&Path>,
    adjust: impl FnOnce(&mut AppConfig),
) -> Result<RuntimeConfig, AppError> {
    let mut app_config = AppConfig::load(config)?;
    adjust(&mut app_config);
    Ok(app_config.resolve()?)
}

/// Build an idle manager over the configured JSON-RPC endpoint.
fn build_manager(runtime: &RuntimeConfig) -> Result<Arc<LifecycleManager<RpcProvider>>, AppError> {
    let provider = Arc::new(RpcProvider::new(&runtime.rpc_url)?);
    Ok(Arc::new(LifecycleManager::new(
        provider,
        runtime.source.clone(),
        runtime.lifecycle(),
        runtime.lookup_concurrency,
    )))
}

// =============================================================================
// WATCH COMMAND
// =============================================================================

/// Connect and print the table until Ctrl+C.
///
/// Connection failures are reported and retried, and a session lost to an
/// unreachable provider is reconnected. Only configuration errors end the
/// command early.
pub async fn cmd_watch(config: Option<&Path>, device: Option<String>) -> Result<(), AppError> {
    let runtime = load_runtime(config, |c| {
        if let Some(device) = device {
            c.device_id = device;
        }
    })?;
    let manager = build_manager(&runtime)?;
    let mut renderer = TableRenderer::new(std::io::stdout());

    renderer.notice(&format!(
        "Following {} on contract {} via {}",
        runtime.device_id, runtime.contract_address, runtime.rpc_url
    ))?;

    loop {
        let context = loop {
            match manager.connect().await {
                Ok(context) => break context,
                Err(e) => {
                    tracing::warn!(error = %e, "Connect failed");
                    renderer.notice(&format!(
                        "Connection failed: {}. Retrying in {}s (Ctrl+C to quit)",
                        e,
                        CONNECT_RETRY.as_secs()
                    ))?;
                    tokio::select! {
                        _ = tokio::time::sleep(CONNECT_RETRY) => {}
                        _ = tokio::signal::ctrl_c() => return Ok(()),
                    }
                }
            }
        };
        renderer.notice(&format!(
            "Connected as {} (chain {})",
            context.account(),
            context.chain_id()
        ))?;

        let mut states = manager.subscribe_state();
        let mut snapshots = manager.subscribe_snapshots();
        let current = snapshots.borrow_and_update().clone();
        renderer.render(&current)?;

        let interrupted = loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break true;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    renderer.render(&snapshot)?;
                }
                changed = states.changed() => {
                    if changed.is_err() {
                        break true;
                    }
                    if *states.borrow_and_update() == LifecycleState::Idle {
                        break false;
                    }
                }
                _ = tokio::signal::ctrl_c() => break true,
            }
        };

        if interrupted {
            renderer.notice("Disconnecting")?;
            manager.disconnect().await;
            return Ok(());
        }
        renderer.notice("Provider lost, reconnecting")?;
    }
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP API.
pub async fn cmd_serve(
    config: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    idle: bool,
) -> Result<(), AppError> {
    let runtime = load_runtime(config, |c| {
        if let Some(host) = host {
            c.server.host = host;
        }
        if let Some(port) = port {
            c.server.port = port;
        }
    })?;
    let manager = build_manager(&runtime)?;

    println!("Sensorwatch Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", runtime.server_addr);
    println!("  Provider: {}", runtime.rpc_url);
    println!("  Contract: {}", runtime.contract_address);
    println!("  Device:   {}", runtime.device_id);
    println!();
    println!("Endpoints:");
    println!("  GET  /health             - Health check");
    println!("  GET  /status             - Lifecycle status");
    println!("  GET  /series             - Current series");
    println!("  POST /session/connect    - Connect to the provider");
    println!("  POST /session/disconnect - Tear down the session");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    if !idle {
        // The API stays up so a later POST /session/connect can retry.
        match manager.connect().await {
            Ok(context) => tracing::info!(account = %context.account(), "Connected at startup"),
            Err(e) => tracing::warn!(error = %e, "Startup connect failed"),
        }
    }

    api::run_server(&runtime.server_addr, AppState::new(manager)).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Write a config file for a deployed contract.
pub fn cmd_init(
    config: Option<&Path>,
    contract_address: String,
    rpc_url: Option<String>,
    device: Option<String>,
    force: bool,
    json_mode: bool,
) -> Result<(), AppError> {
    let path = config_path(config);
    let mut app_config = AppConfig {
        contract_address: Some(contract_address),
        ..AppConfig::default()
    };
    if let Some(rpc_url) = rpc_url {
        app_config.rpc_url = rpc_url;
    }
    if let Some(device) = device {
        app_config.device_id = device;
    }

    write_config(&path, &app_config, force)?;

    if json_mode {
        let output = serde_json::json!({
            "success": true,
            "path": path.to_string_lossy(),
            "contract_address": app_config.contract_address,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Validate config and query the provider.
pub async fn cmd_check(config: Option<&Path>, json_mode: bool) -> Result<(), AppError> {
    let runtime = load_runtime(config, |_| {})?;
    let provider = RpcProvider::new(&runtime.rpc_url)?;

    let accounts = provider.request_accounts().await?;
    let chain_id = provider.chain_id().await?;
    let latest = provider.latest_block().await?;

    if json_mode {
        let output = serde_json::json!({
            "rpc_url": runtime.rpc_url,
            "contract_address": runtime.contract_address.to_string(),
            "device_id": runtime.device_id.as_str(),
            "accounts": accounts,
            "chain_id": chain_id,
            "latest_block": latest.value(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Sensorwatch Check");
    println!("=================");
    println!("Provider:     {}", runtime.rpc_url);
    println!("Contract:     {}", runtime.contract_address);
    println!("Device:       {}", runtime.device_id);
    println!();
    println!("Accounts:     {}", accounts.len());
    println!("Active:       {}", accounts.first().map_or("-", String::as_str));
    println!("Chain id:     {}", chain_id);
    println!("Latest block: {}", latest);

    Ok(())
}
